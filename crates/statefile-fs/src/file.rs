//! A reference to one path on the filesystem

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::inspect::{self, StatResult};
use crate::lock::{self, LockConfig, OpenMode, ScopedHandle};
use crate::{Error, Result};

/// Handle for a single path.
///
/// Holds nothing but the path: no descriptor is open and nothing is cached
/// until an operation runs, so references are cheap to clone and share.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileReference {
    path: PathBuf,
}

impl FileReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `scope` with this file opened and exclusively locked.
    ///
    /// See [`lock::exclusive_open`].
    pub fn exclusive_open<T, E, F>(
        &self,
        permissions: u32,
        mode: OpenMode,
        timeout: Option<Duration>,
        scope: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ScopedHandle) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        lock::exclusive_open(&self.path, permissions, mode, timeout, scope)
    }

    pub fn exclusive_open_with<T, E, F>(
        &self,
        config: &LockConfig,
        scope: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ScopedHandle) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        lock::exclusive_open_with(&self.path, config, scope)
    }

    pub fn exists(&self) -> bool {
        inspect::exists(&self.path)
    }

    pub fn is_symlink(&self) -> bool {
        inspect::is_symlink(&self.path)
    }

    pub fn is_file(&self) -> bool {
        inspect::is_file(&self.path)
    }

    pub fn is_directory(&self) -> bool {
        inspect::is_directory(&self.path)
    }

    pub fn stat(&self) -> Result<StatResult> {
        inspect::stat(&self.path)
    }

    pub fn lstat(&self) -> Result<StatResult> {
        inspect::lstat(&self.path)
    }

    pub fn readlink(&self) -> Result<PathBuf> {
        inspect::readlink(&self.path)
    }

    pub fn realpath(&self) -> Result<PathBuf> {
        inspect::realpath(&self.path)
    }

    /// Create a link at `link` pointing at this reference's path.
    pub fn symlink(&self, link: impl AsRef<Path>) -> Result<FileReference> {
        let link = link.as_ref();
        inspect::symlink(&self.path, link)?;
        Ok(FileReference::new(link))
    }

    pub fn unlink(&self) -> Result<()> {
        inspect::unlink(&self.path)
    }

    /// Read the whole file without taking the lock.
    pub fn read_to_string(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| Error::io(&self.path, e))
    }

    /// Create the file if missing and set its modification time to now.
    pub fn touch(&self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        file.set_modified(SystemTime::now())
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Create the directory and all missing parents.
    pub fn mkpath(&self) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|e| Error::io(&self.path, e))
    }
}

impl AsRef<Path> for FileReference {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for FileReference {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileReference {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for FileReference {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
