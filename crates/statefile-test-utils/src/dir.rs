//! [`StateDir`] scratch directory for state-file tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory that holds the state files of one test.
///
/// # Example
///
/// ```rust,no_run
/// use statefile_test_utils::StateDir;
///
/// let dir = StateDir::new();
/// let counter = dir.file_containing("counter", "0");
/// dir.assert_file_contains("counter", "0");
/// assert!(!dir.path("missing").exists());
/// # let _ = counter;
/// ```
pub struct StateDir {
    temp_dir: TempDir,
}

impl Default for StateDir {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDir {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of `name` inside the directory. Nothing is created.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    /// Write `content` to `name` and return its path.
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    pub fn file_containing(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("file_containing: failed to write {}: {e}", path.display()));
        path
    }

    /// Create the directory `name` and return its path.
    ///
    /// # Panics
    /// Panics if the directory cannot be created.
    pub fn subdir(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        fs::create_dir_all(&path)
            .unwrap_or_else(|e| panic!("subdir: failed to create {}: {e}", path.display()));
        path
    }

    /// Assert that the file `name` holds exactly `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or holds anything else.
    pub fn assert_file_contains(&self, name: &str, content: &str) {
        let full_path = self.path(name);
        let file_content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert_eq!(
            file_content,
            content,
            "File {} does not hold the expected content",
            full_path.display()
        );
    }
}
