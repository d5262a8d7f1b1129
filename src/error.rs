// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::container::ContainerError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PropagationError>;

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("Failed to load record {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Engine call `{operation}` failed: {reason}")]
    Engine { operation: String, reason: String },

    #[error("Failed to store record {path}: {reason}")]
    Store { path: PathBuf, reason: String },

    #[error("Lineage merge into {path} failed: {reason}")]
    Merge { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used when reporting per-item batch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Load,
    Engine,
    Store,
    Merge,
    Config,
}

impl PropagationError {
    pub fn engine(operation: &str, reason: impl fmt::Display) -> Self {
        Self::Engine {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load { .. } => ErrorKind::Load,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::Store { .. } | Self::Io(_) => ErrorKind::Store,
            Self::Merge { .. } => ErrorKind::Merge,
            Self::Config(_) | Self::Validation(_) => ErrorKind::Config,
            Self::Container(_) => ErrorKind::Load,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Load => "load",
            Self::Engine => "engine",
            Self::Store => "store",
            Self::Merge => "merge",
            Self::Config => "config",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_projection() {
        let err = PropagationError::engine("apply_stage", "diverged");
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(
            err.to_string(),
            "Engine call `apply_stage` failed: diverged"
        );

        let err = PropagationError::Merge {
            path: PathBuf::from("out.h5"),
            reason: "locked".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Merge);
        assert_eq!(ErrorKind::Merge.to_string(), "merge");
    }
}
