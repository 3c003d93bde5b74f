//! Filesystem primitives for shared agent state
//!
//! Provides exclusive, timeout-bounded mutation of files shared between
//! processes, symlink-aware path inspection, and normalization of path-list
//! settings values.

pub mod error;
pub mod file;
pub mod inspect;
pub mod lock;
pub mod path;
pub mod path_list;
pub mod settings;

pub use error::{Error, ErrorKind, Result};
pub use file::FileReference;
pub use inspect::{EntryKind, StatResult};
pub use lock::{LockConfig, OpenMode, ScopedHandle, exclusive_open, exclusive_open_with};
pub use path::NormalizedPath;
pub use path_list::{PathListNormalizer, PathListStyle, munge};
pub use settings::SettingsStore;
