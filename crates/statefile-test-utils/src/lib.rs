//! Shared test utilities for the statefile workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`dir`]: [`StateDir`] scratch directory with file fixtures
//! - [`process`]: run a test role in a separate OS process
//! - [`logging`]: tracing output for test runs

pub mod dir;
pub mod logging;
pub mod process;

pub use dir::StateDir;
