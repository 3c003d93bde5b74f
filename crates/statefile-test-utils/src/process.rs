//! Run a test role in a separate OS process.
//!
//! Advisory locks are owned by processes, so contention between threads of
//! one test binary does not prove anything about contention between agents.
//! These helpers re-execute the current test binary with a filter that
//! selects a single "entry" test, and pass the role to play through the
//! environment:
//!
//! ```rust,no_run
//! use statefile_test_utils::process::{self, RoleCommand};
//!
//! #[test]
//! fn child_entry() {
//!     match process::current_role().as_deref() {
//!         Some("touch") => std::fs::write(process::role_path().unwrap(), "x").unwrap(),
//!         _ => {}
//!     }
//! }
//!
//! #[test]
//! fn parent() {
//!     let child = RoleCommand::new("child_entry", "touch").path("/tmp/x").spawn();
//!     child.wait_success();
//! }
//! ```
//!
//! Outside a spawned child the entry test sees no role and does nothing.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Environment variable naming the role of a spawned child.
pub const ROLE_ENV: &str = "STATEFILE_TEST_ROLE";
/// Environment variable carrying the path a spawned child works on.
pub const PATH_ENV: &str = "STATEFILE_TEST_PATH";

/// The role this process was spawned for, if any.
pub fn current_role() -> Option<String> {
    env::var(ROLE_ENV).ok()
}

/// The path handed to this child by [`RoleCommand::path`].
pub fn role_path() -> Option<PathBuf> {
    env::var_os(PATH_ENV).map(PathBuf::from)
}

/// Builder for a child process running one role.
#[derive(Debug, Clone)]
pub struct RoleCommand {
    entry: String,
    role: String,
    envs: Vec<(String, OsString)>,
}

impl RoleCommand {
    /// `entry` is the name of the test function that dispatches on
    /// [`current_role`]; it must be a top-level test of the binary.
    pub fn new(entry: &str, role: &str) -> Self {
        Self {
            entry: entry.to_string(),
            role: role.to_string(),
            envs: Vec::new(),
        }
    }

    pub fn path(self, path: impl AsRef<Path>) -> Self {
        self.env(PATH_ENV, path.as_ref().as_os_str())
    }

    pub fn env(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    /// Start the child.
    ///
    /// # Panics
    /// Panics if the test binary cannot be located or started.
    pub fn spawn(self) -> ChildGuard {
        let exe = env::current_exe()
            .unwrap_or_else(|e| panic!("RoleCommand::spawn: no current executable: {e}"));
        let child = Command::new(&exe)
            .args([
                self.entry.as_str(),
                "--exact",
                "--nocapture",
                "--test-threads=1",
            ])
            .env(ROLE_ENV, &self.role)
            .envs(self.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .unwrap_or_else(|e| panic!("RoleCommand::spawn: failed to start {}: {e}", exe.display()));
        tracing::debug!(role = %self.role, pid = child.id(), "spawned child process");
        ChildGuard { child: Some(child) }
    }
}

/// A spawned child. Killed on drop unless it was waited for.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Wait for the child to exit.
    ///
    /// # Panics
    /// Panics if waiting fails.
    pub fn wait(mut self) -> ExitStatus {
        let mut child = self.child.take().expect("child already reaped");
        child
            .wait()
            .unwrap_or_else(|e| panic!("ChildGuard::wait: {e}"))
    }

    /// Wait for the child and assert it exited successfully.
    ///
    /// # Panics
    /// Panics if the child failed.
    pub fn wait_success(self) {
        let status = self.wait();
        assert!(status.success(), "child process failed: {status}");
    }

    /// Kill the child and reap it.
    pub fn kill(mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Poll until `path` exists. Returns false if `timeout` elapsed first.
pub fn wait_for_path(path: impl AsRef<Path>, timeout: Duration) -> bool {
    let path = path.as_ref();
    let started = Instant::now();
    while !path.exists() {
        if started.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    true
}
