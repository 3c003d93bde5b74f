//! Normalization of settings values holding a list of paths
//!
//! A path list is one string with elements joined by the platform's list
//! separator (`:` on POSIX, `;` on Windows). [`munge`] makes every element
//! absolute and, for Windows, converts it to forward slashes while keeping a
//! UNC `\\server\share` prefix intact as `//server/share`.

use std::path::{Path, PathBuf};

use crate::{Error, NormalizedPath, Result};

/// Path syntax the normalizer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathListStyle {
    Posix,
    Windows,
}

impl PathListStyle {
    /// The style of the platform this binary was built for.
    pub const fn host() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Posix }
    }

    pub const fn separator(self) -> char {
        match self {
            Self::Posix => ':',
            Self::Windows => ';',
        }
    }

    fn normalize(self, path: &str) -> NormalizedPath {
        match self {
            Self::Posix => NormalizedPath::posix(path),
            Self::Windows => NormalizedPath::new(path),
        }
    }
}

/// Expands path-list elements against a fixed working and home directory.
#[derive(Debug, Clone)]
pub struct PathListNormalizer {
    style: PathListStyle,
    cwd: NormalizedPath,
    home: Option<NormalizedPath>,
}

impl PathListNormalizer {
    pub fn new(style: PathListStyle, cwd: impl AsRef<Path>, home: Option<PathBuf>) -> Self {
        let cwd = style.normalize(&cwd.as_ref().to_string_lossy());
        let home = home.map(|home| style.normalize(&home.to_string_lossy()));
        Self { style, cwd, home }
    }

    /// A normalizer for this process: host style, current directory and the
    /// user's home directory.
    pub fn for_host() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        Ok(Self::new(PathListStyle::host(), cwd, dirs::home_dir()))
    }

    pub fn style(&self) -> PathListStyle {
        self.style
    }

    /// Normalize a path-list value. Unset stays unset.
    pub fn munge(&self, value: Option<&str>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        if value.contains('\0') {
            return Err(Error::invalid_argument("path list contains a NUL byte"));
        }

        let separator = self.style.separator();
        let elements = value
            .split(separator)
            .map(|element| self.expand(element, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(elements.join(&separator.to_string())))
    }

    fn expand(&self, element: &str, value: &str) -> Result<String> {
        if element.is_empty() {
            return Err(Error::invalid_argument(format!(
                "empty element in path list {value:?}"
            )));
        }

        if let Some(rest) = home_relative(element, self.style) {
            let home = self.home.as_ref().ok_or_else(|| {
                Error::invalid_argument(format!("cannot expand {element:?}: no home directory"))
            })?;
            return Ok(home.join(self.style.normalize(rest).as_str()).into_string());
        }

        let path = self.style.normalize(element);
        let absolute = match self.style {
            PathListStyle::Posix => path.is_absolute(),
            PathListStyle::Windows => {
                path.is_network_path() || (path.drive().is_some() && path.is_absolute())
            }
        };
        if absolute {
            return Ok(path.into_string());
        }

        let expanded = match (self.style, path.drive()) {
            // `C:foo`: relative to cwd on the same drive, else to that drive's root
            (PathListStyle::Windows, Some(drive)) => {
                let rest = &path.as_str()[drive.len()..];
                let same_drive = self
                    .cwd
                    .drive()
                    .is_some_and(|cwd_drive| cwd_drive.eq_ignore_ascii_case(drive));
                if same_drive {
                    self.cwd.join(rest)
                } else {
                    NormalizedPath::new(format!("{drive}/{rest}"))
                }
            }
            // `\foo`: rooted without drive, take the drive of the working directory
            (PathListStyle::Windows, None) if element.starts_with(['/', '\\']) => {
                let drive = self.cwd.drive().unwrap_or_default();
                NormalizedPath::new(format!("{drive}{}", path.as_str()))
            }
            _ => self.cwd.join(path.as_str()),
        };
        Ok(expanded.into_string())
    }
}

/// The remainder after a leading `~` if the element is home-relative.
fn home_relative(element: &str, style: PathListStyle) -> Option<&str> {
    let rest = element.strip_prefix('~')?;
    let is_separator = |c: char| c == '/' || (style == PathListStyle::Windows && c == '\\');
    match rest.chars().next() {
        None => Some(""),
        Some(c) if is_separator(c) => Some(rest.trim_start_matches(is_separator)),
        _ => None,
    }
}

/// Normalize a path-list value for this process.
///
/// `None` is returned unchanged. Every element of a string value is expanded
/// to an absolute path relative to the current directory.
pub fn munge(value: Option<&str>) -> Result<Option<String>> {
    if value.is_none() {
        return Ok(None);
    }
    PathListNormalizer::for_host()?.munge(value)
}
