//! Error types for the acquisition pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Rejection of a single sensor line. Never fatal to the acquisition loop.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// Wrong number of comma-separated fields.
    #[error("malformed frame: expected {expected} fields, got {fields}")]
    Malformed { fields: usize, expected: usize },

    /// A field is not a finite decimal number.
    #[error("invalid numeric field {index}: {field:?}")]
    InvalidNumeric { index: usize, field: String },
}

/// Serial link failures.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The endpoint could not be opened at startup.
    #[error("failed to open serial endpoint {endpoint}: {source}")]
    Open {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// A read or write fault on an open link.
    #[error("serial fault: {0}")]
    Fault(#[from] std::io::Error),

    /// Reconnection after a fault also failed. Terminal.
    #[error("serial link failed, reconnect was unsuccessful: {source}")]
    Failed {
        #[source]
        source: std::io::Error,
    },
}

/// Fingerprint store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but is not a label -> vector object.
    #[error("fingerprint file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Whole-file rewrite did not complete. The in-memory entry is kept.
    #[error("failed to persist fingerprints to {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("label must not be empty")]
    EmptyLabel,

    /// A reference record could not be turned into an 18-channel vector.
    #[error("invalid reference {label:?}: {reason}")]
    InvalidReference { label: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
