//! Path key machinery for stores whose keys form a hierarchy.
//!
//! - [`relative`] -- strip and attach a fixed prefix
//! - [`template`] -- regex-backed path templates and their key maps
//! - [`nested`] -- directory-style sub-store views
//! - [`path_get`] -- key paths through nested values
//!
//! Path tuple conversion lives in [`codec::path_tuple`](crate::codec::path_tuple).

pub mod nested;
pub mod path_get;
pub mod relative;
pub mod template;

pub use nested::{NestedPaths, Node};
pub use path_get::{AddPathGet, Descend, JsonStore, KeyPath, PathGetLayer};
pub use relative::{RelativeLayer, RelativePaths};
pub use template::{PathTemplate, TemplateError};
