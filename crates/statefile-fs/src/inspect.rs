//! Symlink-aware path inspection
//!
//! Every query goes to the filesystem; nothing is cached, so two calls on the
//! same path can disagree if something changed the entry in between.
//!
//! The distinction that matters here is which queries follow links:
//!
//! | query        | follows the final link? |
//! |--------------|-------------------------|
//! | [`exists`]   | yes, the whole chain    |
//! | [`stat`]     | yes, the whole chain    |
//! | [`realpath`] | yes, the whole chain    |
//! | [`is_symlink`] | no                    |
//! | [`lstat`]    | no                      |
//! | [`readlink`] | one hop                 |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{Error, Result};

/// The kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Link,
    Other,
}

impl EntryKind {
    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Link
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Link => "link",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an entry's metadata, taken by [`stat`] or [`lstat`].
#[derive(Debug, Clone)]
pub struct StatResult {
    kind: EntryKind,
    metadata: fs::Metadata,
}

impl StatResult {
    fn new(metadata: fs::Metadata) -> Self {
        Self {
            kind: EntryKind::from_file_type(metadata.file_type()),
            metadata,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn len(&self) -> u64 {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last modification time, if the platform records one.
    pub fn modified(&self) -> Option<SystemTime> {
        self.metadata.modified().ok()
    }

    pub fn is_readonly(&self) -> bool {
        self.metadata.permissions().readonly()
    }

    /// Permission and file-type bits as reported by `st_mode`.
    #[cfg(unix)]
    pub fn mode(&self) -> u32 {
        use std::os::unix::fs::MetadataExt;
        self.metadata.mode()
    }

    /// Raw platform metadata.
    pub fn metadata(&self) -> &fs::Metadata {
        &self.metadata
    }
}

/// True if `path` resolves, following any links, to an existing entry.
///
/// A dangling link is reported as absent.
pub fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).is_ok()
}

/// True if the entry at `path` is itself a symbolic link, dangling or not.
pub fn is_symlink(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path.as_ref())
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

pub fn is_file(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).is_ok_and(|m| m.is_file())
}

pub fn is_directory(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).is_ok_and(|m| m.is_dir())
}

/// Metadata of the entry at the end of the link chain.
///
/// Fails with [`Error::NotFound`] if the path or any hop is missing.
pub fn stat(path: impl AsRef<Path>) -> Result<StatResult> {
    let path = path.as_ref();
    fs::metadata(path)
        .map(StatResult::new)
        .map_err(|e| Error::io(path, e))
}

/// Metadata of the entry itself; a final-component link is not followed.
pub fn lstat(path: impl AsRef<Path>) -> Result<StatResult> {
    let path = path.as_ref();
    fs::symlink_metadata(path)
        .map(StatResult::new)
        .map_err(|e| Error::io(path, e))
}

/// The target stored in the link at `path`, exactly as written.
///
/// Only one hop is read: for `b -> a -> file`, `readlink(b)` is `a`.
pub fn readlink(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    fs::read_link(path).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidInput => {
            Error::invalid_argument(format!("not a symbolic link: {}", path.display()))
        }
        _ => Error::io(path, e),
    })
}

/// Fully resolved, canonical form of `path`.
pub fn realpath(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    dunce::canonicalize(path).map_err(|e| Error::io(path, e))
}

/// Create a symbolic link at `link` pointing at `target`.
///
/// `target` is stored verbatim; a relative target is resolved against the
/// link's directory when the link is followed.
pub fn symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let (target, link) = (target.as_ref(), link.as_ref());
    tracing::debug!(target = %target.display(), link = %link.display(), "creating symlink");
    create_symlink(target, link).map_err(|e| symlink_error(link, e))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let resolved = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    };
    // dangling targets get a file link
    if resolved.is_dir() {
        symlink_dir(target, link)
    } else {
        symlink_file(target, link)
    }
}

fn symlink_error(link: &Path, source: io::Error) -> Error {
    // ERROR_PRIVILEGE_NOT_HELD
    #[cfg(windows)]
    if source.raw_os_error() == Some(1314) {
        return Error::PermissionDenied {
            path: link.to_path_buf(),
            source,
        };
    }
    Error::io(link, source)
}

/// Remove a file or a link entry. Links are removed, never their targets.
pub fn unlink(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let metadata = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if metadata.file_type().is_symlink_dir() {
            return fs::remove_dir(path).map_err(|e| Error::io(path, e));
        }
    }

    if metadata.is_dir() {
        return Err(Error::invalid_argument(format!(
            "refusing to unlink a directory: {}",
            path.display()
        )));
    }
    fs::remove_file(path).map_err(|e| Error::io(path, e))
}
