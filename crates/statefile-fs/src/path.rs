//! Forward-slash path values for cross-platform comparison and display

use std::path::{Path, PathBuf};

/// A path lexically normalized to forward slashes.
///
/// Repeated separators are collapsed and `.`/`..` components are resolved
/// without touching the filesystem. A leading `//` is kept as the marker of a
/// network (UNC) path, and a leading drive letter (`C:`) is kept as a prefix
/// that `..` can never climb above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Normalize any path-like input, treating backslashes as separators.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: clean(&raw),
        }
    }

    /// Normalize a POSIX path, where a backslash is an ordinary filename
    /// character rather than a separator.
    pub fn posix(path: &str) -> Self {
        Self { inner: clean(path) }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn into_string(self) -> String {
        self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// True for `//server/share` style paths.
    pub fn is_network_path(&self) -> bool {
        self.inner.starts_with("//")
    }

    /// The drive prefix (`C:`) if the path carries one.
    pub fn drive(&self) -> Option<&str> {
        drive_prefix(&self.inner)
    }

    /// True when the path is anchored: a network path, a rooted path, or a
    /// drive followed by a root.
    pub fn is_absolute(&self) -> bool {
        match self.drive() {
            Some(drive) => self.inner[drive.len()..].starts_with('/'),
            None => self.inner.starts_with('/'),
        }
    }

    /// Join a segment already in forward-slash form. Absolute segments
    /// replace the receiver.
    pub fn join(&self, segment: &str) -> Self {
        let candidate = Self::posix(segment);
        if candidate.is_absolute() {
            return candidate;
        }
        Self::posix(&format!("{}/{}", self.inner, segment))
    }

    pub fn file_name(&self) -> Option<&str> {
        let (_, rest) = split_prefix(&self.inner);
        rest.rsplit('/').next().filter(|name| !name.is_empty() && *name != "..")
    }
}

fn drive_prefix(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        Some(&path[..2])
    } else {
        None
    }
}

/// Split into the anchor (`//`, `C:/`, `C:`, `/` or nothing) and the rest.
fn split_prefix(path: &str) -> (&str, &str) {
    if path.starts_with("//") && !path.starts_with("///") {
        return path.split_at(2);
    }
    if let Some(drive) = drive_prefix(path) {
        let rooted = path[drive.len()..].starts_with('/');
        return path.split_at(drive.len() + usize::from(rooted));
    }
    if path.starts_with('/') {
        return path.split_at(1);
    }
    ("", path)
}

fn clean(path: &str) -> String {
    let (prefix, rest) = split_prefix(path);
    let unc = prefix == "//";
    let rooted = prefix.ends_with('/');
    // server and share of a UNC path can't be popped
    let floor = if unc { 2 } else { 0 };

    let mut parts: Vec<&str> = Vec::new();
    for component in rest.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                let poppable = matches!(parts.last(), Some(&last) if last != "..");
                if poppable && parts.len() > floor {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if prefix.is_empty() && body.is_empty() {
        return ".".to_string();
    }
    format!("{prefix}{body}")
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo\\bar\\baz", "foo/bar/baz")]
    #[case("foo//bar/", "foo/bar")]
    #[case("/a/./b/../c", "/a/c")]
    #[case("/..", "/")]
    #[case("../x", "../x")]
    #[case("a/..", ".")]
    #[case("C:\\test\\directory", "C:/test/directory")]
    #[case("C:\\..\\x", "C:/x")]
    #[case("\\\\server\\share\\dir", "//server/share/dir")]
    #[case("//server/share/../../x", "//server/share/x")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(NormalizedPath::new(input).as_str(), expected);
    }

    #[test]
    fn posix_keeps_backslashes() {
        let path = NormalizedPath::posix("/tmp/odd\\name");
        assert_eq!(path.as_str(), "/tmp/odd\\name");
    }

    #[rstest]
    #[case("/etc", true)]
    #[case("C:/x", true)]
    #[case("//srv/share", true)]
    #[case("C:x", false)]
    #[case("relative/x", false)]
    fn absolute(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(NormalizedPath::new(input).is_absolute(), expected);
    }

    #[test]
    fn join_replaces_on_absolute_segment() {
        let base = NormalizedPath::new("C:/work");
        assert_eq!(base.join("sub/file").as_str(), "C:/work/sub/file");
        assert_eq!(base.join("D:/other").as_str(), "D:/other");
        assert_eq!(base.join("../x").as_str(), "C:/x");
    }

    #[test]
    fn network_and_drive_detection() {
        assert!(NormalizedPath::new("\\\\srv\\share").is_network_path());
        assert!(!NormalizedPath::new("/home/user").is_network_path());
        assert_eq!(NormalizedPath::new("c:/x").drive(), Some("c:"));
        assert_eq!(NormalizedPath::new("/x").file_name(), Some("x"));
    }
}
