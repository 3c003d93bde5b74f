//! Exclusive file access with advisory locking
//!
//! [`exclusive_open`] opens (creating if the mode allows) a single file, takes
//! an exclusive advisory lock on it, and hands a [`ScopedHandle`] to a closure.
//! The lock is process-visible: `flock` on POSIX, `LockFileEx` on Windows,
//! both through [`fs2::FileExt`]. Any other `exclusive_open` on the same path,
//! in this process or another one, waits until the closure has returned and
//! the handle has been dropped.
//!
//! Locks are not reentrant. Calling `exclusive_open` for a path from inside a
//! scope that already holds that path's lock waits on itself, forever without
//! a timeout. Callers must not nest scopes on one path.
//!
//! ```rust,no_run
//! use statefile_fs::{OpenMode, lock};
//!
//! lock::exclusive_open("/var/lib/agent/counter", 0o660, OpenMode::ReadWriteCreate, None, |fh| {
//!     let current: u64 = fh.read_to_string()?.trim().parse().unwrap_or(0);
//!     fh.replace_contents((current + 1).to_string().as_bytes())?;
//!     Ok::<_, statefile_fs::Error>(())
//! })?;
//! # Ok::<_, statefile_fs::Error>(())
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Permission bits used when a file is created and no other bits are given.
pub const DEFAULT_PERMISSIONS: u32 = 0o660;

const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How [`exclusive_open`] opens the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    /// Read only; the file must exist. The lock taken is still exclusive.
    ReadExisting,
    /// Read and write; the file must exist. Positioned at the start.
    #[default]
    ReadWriteExisting,
    /// Read and write, created if missing. Positioned at the start.
    ReadWriteCreate,
    /// Created if missing, emptied once the lock is held.
    TruncateCreate,
    /// Read and append, created if missing. Writes always land at the end.
    AppendCreate,
}

impl OpenMode {
    pub fn creates(self) -> bool {
        matches!(
            self,
            Self::ReadWriteCreate | Self::TruncateCreate | Self::AppendCreate
        )
    }

    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(true);
        match self {
            Self::ReadExisting => {}
            Self::ReadWriteExisting | Self::ReadWriteCreate | Self::TruncateCreate => {
                options.write(true);
            }
            Self::AppendCreate => {
                options.append(true);
            }
        }
        options
    }
}

/// Lock policy for [`exclusive_open_with`].
///
/// Durations are (de)serialized as whole milliseconds so the policy can live
/// in a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub mode: OpenMode,
    /// Unix permission bits for a newly created file, subject to the umask.
    pub permissions: u32,
    /// How long to wait for the lock; `None` waits indefinitely.
    #[serde(rename = "timeout_ms", with = "millis::option")]
    pub timeout: Option<Duration>,
    /// Upper bound on the sleep between two lock attempts.
    #[serde(rename = "max_poll_interval_ms", with = "millis")]
    pub max_poll_interval: Duration,
    /// Flush file data to disk before the lock is dropped.
    pub sync_on_release: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            mode: OpenMode::default(),
            permissions: DEFAULT_PERMISSIONS,
            timeout: None,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            sync_on_release: false,
        }
    }
}

impl LockConfig {
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    pub fn with_sync_on_release(mut self, sync: bool) -> Self {
        self.sync_on_release = sync;
        self
    }
}

/// Open `path`, lock it exclusively and run `scope` with the locked handle.
///
/// `permissions` only apply if this call creates the file. With a `timeout`
/// the call fails with [`Error::Timeout`] once the lock could not be taken in
/// time; the file is left untouched in that case. Lock and descriptor are
/// released before this function returns, whether `scope` succeeded, failed
/// or panicked.
pub fn exclusive_open<T, E, F>(
    path: impl AsRef<Path>,
    permissions: u32,
    mode: OpenMode,
    timeout: Option<Duration>,
    scope: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(&mut ScopedHandle) -> std::result::Result<T, E>,
    E: From<Error>,
{
    let config = LockConfig::default()
        .with_mode(mode)
        .with_permissions(permissions)
        .with_timeout(timeout);
    exclusive_open_with(path, &config, scope)
}

/// [`exclusive_open`] driven by a [`LockConfig`].
pub fn exclusive_open_with<T, E, F>(
    path: impl AsRef<Path>,
    config: &LockConfig,
    scope: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(&mut ScopedHandle) -> std::result::Result<T, E>,
    E: From<Error>,
{
    let mut handle = ScopedHandle::acquire(path.as_ref(), config)?;
    let value = scope(&mut handle)?;
    handle.release()?;
    Ok(value)
}

/// An open file holding an exclusive advisory lock.
///
/// Only reachable inside an [`exclusive_open`] scope. Dropping the handle
/// unlocks and closes the file.
#[derive(Debug)]
pub struct ScopedHandle {
    file: File,
    path: PathBuf,
    created: bool,
    sync_on_release: bool,
    released: bool,
}

impl ScopedHandle {
    fn acquire(path: &Path, config: &LockConfig) -> Result<Self> {
        let (file, created) = open(path, config)?;
        wait_for_lock(&file, path, config.timeout, config.max_poll_interval)?;
        tracing::debug!(path = %path.display(), mode = ?config.mode, created, "acquired exclusive lock");

        let mut handle = Self {
            file,
            path: path.to_path_buf(),
            created,
            sync_on_release: config.sync_on_release,
            released: false,
        };
        if config.mode == OpenMode::TruncateCreate {
            handle.truncate()?;
        }
        Ok(handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if this scope's call created the file.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Cut the file to zero length. The position is left where it was.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0).map_err(|e| Error::io(&self.path, e))
    }

    /// Read from the current position to the end.
    pub fn read_to_string(&mut self) -> Result<String> {
        let mut content = String::new();
        self.file
            .read_to_string(&mut content)
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(content)
    }

    /// Read the whole file, regardless of the current position.
    pub fn read_all(&mut self) -> Result<String> {
        self.rewind()?;
        self.read_to_string()
    }

    /// Replace the whole content of the file with `content`.
    pub fn replace_contents(&mut self, content: &[u8]) -> Result<()> {
        self.truncate()?;
        self.rewind()?;
        self.file
            .write_all(content)
            .map_err(|e| Error::io(&self.path, e))
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(|e| Error::io(&self.path, e))
    }

    fn release(mut self) -> Result<()> {
        if self.sync_on_release {
            self.sync()?;
        }
        FileExt::unlock(&self.file).map_err(|e| Error::io(&self.path, e))?;
        self.released = true;
        tracing::debug!(path = %self.path.display(), "released exclusive lock");
        Ok(())
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        if !self.released {
            // closing the descriptor below drops the lock even if this fails
            let _ = FileExt::unlock(&self.file);
            tracing::debug!(path = %self.path.display(), "released exclusive lock on early exit");
        }
    }
}

impl Read for ScopedHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for ScopedHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for ScopedHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Open the file for `config.mode`, reporting whether this call created it.
///
/// Two creators racing on a missing path both succeed: one wins
/// `create_new`, the other sees `AlreadyExists` and opens the winner's file.
fn open(path: &Path, config: &LockConfig) -> Result<(File, bool)> {
    let mode = config.mode;
    if !mode.creates() {
        let file = mode.options().open(path).map_err(|e| Error::io(path, e))?;
        return Ok((file, false));
    }

    loop {
        let mut options = mode.options();
        options.create_new(true);
        apply_permissions(&mut options, config.permissions);
        match options.open(path) {
            Ok(file) => return Ok((file, true)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Error::io(path, e)),
        }

        match mode.options().open(path) {
            Ok(file) => return Ok((file, false)),
            // removed again between the two opens
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(path, e)),
        }
    }
}

#[cfg(unix)]
fn apply_permissions(options: &mut OpenOptions, permissions: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(permissions);
}

#[cfg(not(unix))]
fn apply_permissions(_options: &mut OpenOptions, _permissions: u32) {}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn wait_for_lock(
    file: &File,
    path: &Path,
    timeout: Option<Duration>,
    max_poll_interval: Duration,
) -> Result<()> {
    let Some(timeout) = timeout else {
        tracing::trace!(path = %path.display(), "waiting for exclusive lock without timeout");
        return FileExt::lock_exclusive(file).map_err(|e| Error::io(path, e));
    };

    let started = Instant::now();
    let Some(deadline) = started.checked_add(timeout) else {
        return FileExt::lock_exclusive(file).map_err(|e| Error::io(path, e));
    };
    let mut policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_POLL_INTERVAL.min(max_poll_interval))
        .with_max_interval(max_poll_interval)
        .with_max_elapsed_time(None)
        .build();

    // the last attempt is made at or after the deadline, never before it
    loop {
        match FileExt::try_lock_exclusive(file) {
            Ok(()) => return Ok(()),
            Err(e) if is_contended(&e) => {}
            Err(e) => return Err(Error::io(path, e)),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout {
                path: path.to_path_buf(),
                waited: started.elapsed(),
            });
        }

        let interval = policy.next_backoff().unwrap_or(max_poll_interval);
        tracing::trace!(path = %path.display(), ?interval, "lock is held elsewhere, polling");
        thread::sleep(interval.min(deadline - now));
    }
}

/// Serde helpers storing durations as milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn creating_modes() {
        assert!(!OpenMode::ReadExisting.creates());
        assert!(!OpenMode::ReadWriteExisting.creates());
        assert!(OpenMode::ReadWriteCreate.creates());
        assert!(OpenMode::TruncateCreate.creates());
        assert!(OpenMode::AppendCreate.creates());
    }

    #[test]
    fn config_deserializes_from_toml() {
        let config: LockConfig = toml::from_str(
            r#"
            mode = "append-create"
            permissions = 0o600
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            LockConfig::default()
                .with_mode(OpenMode::AppendCreate)
                .with_permissions(0o600)
                .with_timeout(Some(Duration::from_millis(250)))
        );
    }

    #[test]
    fn config_defaults_wait_forever() {
        let config: LockConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.permissions, DEFAULT_PERMISSIONS);
        assert_eq!(config.max_poll_interval, DEFAULT_MAX_POLL_INTERVAL);
    }

    #[test]
    fn second_descriptor_in_same_process_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held");

        exclusive_open(&path, 0o600, OpenMode::ReadWriteCreate, None, |_| {
            let nested = exclusive_open(
                &path,
                0o600,
                OpenMode::ReadWriteExisting,
                Some(Duration::ZERO),
                |_| Ok::<_, Error>(()),
            );
            assert!(nested.unwrap_err().is_timeout());
            Ok::<_, Error>(())
        })
        .unwrap();
    }
}
