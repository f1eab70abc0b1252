//! Error types for polylint.
//!
//! Scanners never fail: malformed source only produces more diagnostics.
//! These errors cover the boundaries around the engine (language lookup,
//! file access, configuration).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LintError {
    #[error("Unsupported language: {id}")]
    UnsupportedLanguage { id: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, LintError>;
