// file: src/container/mod.rs
// description: hierarchical record container module exports and errors
// reference: internal module structure

mod file;
mod tree;

pub use file::{ContainerFile, FORMAT_TAG, FORMAT_VERSION};
pub use tree::{Group, MetaValue, Node};
pub(crate) use tree::segments;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed container {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unsupported container format in {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Branch not found: {0}")]
    MissingBranch(String),

    #[error("Branch is not a group: {0}")]
    NotAGroup(String),

    #[error("Invalid branch path: {0:?}")]
    InvalidPath(String),

    #[error("Non-finite number at {0}; JSON containers hold finite values only")]
    NonFinite(String),

    #[error("Link chain from {branch} exceeds {hops} hops")]
    LinkDepth { branch: String, hops: usize },
}
