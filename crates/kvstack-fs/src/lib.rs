//! Local filesystem backend for kvstack.
//!
//! [`LocalFiles`] exposes the files under a root directory as a store keyed
//! by absolute path, with contents as `String` ([`TextMode`]) or bytes
//! ([`BinaryMode`]). Keys can be restricted by a path template and the walk
//! bounded in depth.
//!
//! Writing into a folder that does not exist fails with `FolderNotFound`;
//! wrap the store in [`MakeMissingDirs`] to create folders on demand.
//! [`relative_files`] keys the files by their path below the root instead.
//!
//! Settings can be loaded from TOML through [`LocalFilesConfig`].

pub mod config;
pub mod dirs;
pub mod local;

pub use config::{ConfigError, FileModeKind, LocalFilesConfig};
pub use dirs::{MakeMissingDirs, MakeMissingDirsLayer};
pub use local::{relative_files, BinaryMode, FileMode, FolderKeyed, LocalFiles, TextMode};
