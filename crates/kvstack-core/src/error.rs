use std::fmt;
use std::path::PathBuf;

/// A store capability that a guard can switch off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get`
    Read,
    /// `set`
    Write,
    /// `delete`
    Delete,
    /// `iter_keys`, `len` and anything derived from enumeration
    Iterate,
    /// Whole-store `clear`.
    Clear,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "reads",
            Operation::Write => "writes",
            Operation::Delete => "deletions",
            Operation::Iterate => "iteration",
            Operation::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// Errors from store operations.
///
/// Every layer of a stack speaks this taxonomy. Adapters translate
/// backend-specific failures into it and attach the original as the source.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key is absent from the underlying store.
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    /// The key fails a declared validation (template, prefix, predicate).
    #[error("key not valid: {key}: {reason}")]
    KeyNotValid { key: String, reason: String },

    /// `set` on an existing key while overwrites are disallowed.
    #[error("overwrite forbidden: {key}")]
    OverwriteForbidden { key: String },

    /// The capability was explicitly disabled on this layer.
    #[error("{op} forbidden{}", .key.as_ref().map(|k| format!(": {k}")).unwrap_or_default())]
    OperationForbidden { op: Operation, key: Option<String> },

    /// The structural parent of a key is missing.
    #[error("folder not found for {key}: {folder}")]
    FolderNotFound { key: String, folder: PathBuf },

    /// A value could not be encoded or decoded by a codec hook.
    #[error("codec error: {0}")]
    Codec(String),

    /// Adapter-specific failure, with the original error attached.
    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn key_not_found(key: &impl fmt::Debug) -> Self {
        Self::KeyNotFound {
            key: format!("{key:?}"),
        }
    }

    pub fn key_not_valid(key: &impl fmt::Debug, reason: impl Into<String>) -> Self {
        Self::KeyNotValid {
            key: format!("{key:?}"),
            reason: reason.into(),
        }
    }

    pub fn overwrite_forbidden(key: &impl fmt::Debug) -> Self {
        Self::OverwriteForbidden {
            key: format!("{key:?}"),
        }
    }

    /// A forbidden operation on a specific key.
    pub fn forbidden(op: Operation, key: &impl fmt::Debug) -> Self {
        Self::OperationForbidden {
            op,
            key: Some(format!("{key:?}")),
        }
    }

    /// A forbidden operation that does not concern a single key.
    pub fn forbidden_op(op: Operation) -> Self {
        Self::OperationForbidden { op, key: None }
    }

    /// Wrap an adapter failure, keeping it as the error source.
    pub fn backend(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Map a poisoned lock to a backend error.
    pub(crate) fn poisoned<E: fmt::Display>(what: &str, err: E) -> Self {
        Self::backend(format!("{what} lock poisoned"), err.to_string())
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Returns `true` if this is an `OperationForbidden` for `op`.
    pub fn is_forbidden(&self, op: Operation) -> bool {
        matches!(self, Self::OperationForbidden { op: o, .. } if *o == op)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
