//! # Error Handling
//!
//! This module defines the centralized error type for the Buckaroo install
//! engine. It uses the `thiserror` library to create a single `Error` enum
//! covering every failure the pipeline can surface, each variant carrying
//! enough context (paths, URLs) to produce a useful message.
//!
//! ## Error kinds
//!
//! - **Lock file errors** are fatal to a whole run: the lock file is missing
//!   and could not be produced, or it exists but cannot be parsed.
//! - **Transport errors** are fatal to one dependency: a clone, fetch or
//!   download failed, or a downloaded artifact failed its integrity check.
//! - **Filesystem errors** are fatal to the operation that raised them.
//!
//! Configuration ambiguities are deliberately *not* errors; see
//! [`crate::buckconfig::ParseWarning`].
//!
//! The `Result` alias is used throughout the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for install operations
#[derive(Error, Debug)]
pub enum Error {
    /// The lock file is missing and could not be generated, or it is malformed.
    #[error("Lock file error at {}: {message}{}", path.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    LockFile {
        path: PathBuf,
        message: String,
        /// Optional hint for how to fix the problem
        hint: Option<String>,
    },

    /// Fetching a source or an auxiliary file failed.
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A pinned digest is not a hex-encoded SHA-256.
    #[error("Invalid sha256 digest {digest:?} (expected 64 hexadecimal digits)")]
    InvalidDigest { digest: String },

    /// A downloaded artifact did not match its pinned digest.
    #[error("Integrity check failed for {url}: expected sha256 {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    /// Creating or writing a file or directory failed.
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },

    /// The external resolver failed to produce a lock file.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// A recipe identifier could not be parsed.
    #[error("Invalid recipe identifier: {input:?} (expected `[source+]organization/recipe`)")]
    InvalidIdentifier { input: String },

    /// Two lock entries install into the same directory.
    #[error("Duplicate lock entry for {identifier}")]
    DuplicateLock { identifier: String },

    /// The worker pool used for concurrent installs could not be created.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// A task of the install run panicked.
    #[error("Internal error while {context}: {message}")]
    Panicked { context: String, message: String },

    /// The run was cancelled before it completed.
    #[error("Installation cancelled")]
    Cancelled,

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap an I/O error with the path it happened at.
    pub fn filesystem(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
