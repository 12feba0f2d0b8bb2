//! Error taxonomy.
//!
//! - [`LoadError`]: per-file, collected alongside results, never aborts a run.
//! - [`IndexError`]: structurally fatal conditions and cancellation.
//! - [`NotFound`]: the expected result of a lookup that matches nothing.
//!
//! Validation findings are not errors; see
//! [`ValidationIssue`](crate::models::ValidationIssue).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A file that could not be turned into documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LoadError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: String },

    #[error("{path} maps to id `{id}`, which is already taken by another file")]
    IdCollision { path: String, id: String },
}

impl LoadError {
    /// Corpus-relative path of the offending file.
    pub fn path(&self) -> &str {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Encoding { path }
            | LoadError::IdCollision { path, .. } => path,
        }
    }
}

/// A condition that stops an indexing run without producing a snapshot.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("corpus root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("corpus root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("invalid glob pattern `{pattern}`: {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("failed to walk corpus: {0}")]
    Walk(String),

    #[error("loader worker failed: {0}")]
    Worker(String),

    #[error("corpus is empty: no markdown documents loaded ({} file errors)", .errors.len())]
    EmptyCorpus { errors: Vec<LoadError> },

    #[error("indexing cancelled")]
    Cancelled,
}

/// No document matched a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document not found: {query}")]
pub struct NotFound {
    pub query: String,
}

impl NotFound {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}
