//! # Error Module
//!
//! Error types for the vault engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - record ids, host names, HTTP status
//! - **Keep recoverable failures distinct** - a duplicate or a failed
//!   optional upload is not the same kind of problem as a failed index write

use crate::core::detector::DuplicateMatch;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    #[error("Collection not found: {id}")]
    CollectionNotFound { id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to format output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Errors that occur while collecting local files to ingest
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while fingerprinting image bytes
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image: {reason}")]
    Decode { reason: String },

    #[error("Image is empty or has zero dimensions")]
    EmptyImage,

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Invalid hash encoding: {0}")]
    InvalidEncoding(String),
}

/// Errors raised by a record index backend
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to open index database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Index query failed: {0}")]
    QueryFailed(String),

    #[error("Index corruption detected at {path}. Restore it from a backup or delete it.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize record: {0}")]
    SerializationFailed(String),
}

/// Errors raised while talking to an image host
#[derive(Error, Debug)]
pub enum HostError {
    #[error("{host} is not configured")]
    NotConfigured { host: String },

    #[error("{host} request failed: {source}")]
    Request {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{host} returned HTTP {status}: {body}")]
    Status {
        host: String,
        status: u16,
        body: String,
    },

    #[error("{host} returned an unexpected response: {reason}")]
    InvalidResponse { host: String, reason: String },

    #[error("{host} rejected the request: {message}")]
    Rejected { host: String, message: String },

    /// The upload went through but cannot be deleted through the API
    #[error("{host} stored the image at {url} but returned no delete URL")]
    MissingDeleteUrl { host: String, url: String },

    #[error("{host} upload task was interrupted: {reason}")]
    Interrupted { host: String, reason: String },
}

impl HostError {
    /// Name of the host that produced this error
    pub fn host(&self) -> &str {
        match self {
            HostError::NotConfigured { host }
            | HostError::Request { host, .. }
            | HostError::Status { host, .. }
            | HostError::InvalidResponse { host, .. }
            | HostError::Rejected { host, .. }
            | HostError::MissingDeleteUrl { host, .. }
            | HostError::Interrupted { host, .. } => host,
        }
    }

    /// URL of an asset the host kept even though the upload failed
    pub fn stranded_url(&self) -> Option<&str> {
        match self {
            HostError::MissingDeleteUrl { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Errors returned by `ingest`
#[derive(Error, Debug)]
pub enum IngestError {
    /// The image is already in the vault. Retry with `ignore_duplicate` to store it anyway.
    #[error("Duplicate of existing image {} ({})", .existing.record.id, .existing.kind)]
    DuplicateFound { existing: Box<DuplicateMatch> },

    #[error("Upload to the required host failed: {0}")]
    RequiredHostUpload(#[source] HostError),

    #[error("Failed to write record to the index: {0}")]
    IndexWrite(#[source] IndexError),

    #[error("Failed to read the index: {0}")]
    IndexRead(#[source] IndexError),

    #[error("Fingerprinting failed: {0}")]
    Fingerprint(String),

    #[error("Image is empty")]
    EmptyInput,
}

/// A host delete that failed during a permanent delete
#[derive(Debug)]
pub struct HostDeleteFailure {
    pub host: String,
    pub error: HostError,
}

/// Errors raised by trash and permanent-delete operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Image not found: {id}")]
    NotFound { id: String },

    #[error("Trashed image not found: {id}")]
    TrashNotFound { id: String },

    #[error(
        "Could not delete hosted copies of trashed image {id} ({}). It stays in the trash; retry later.",
        .failures.iter().map(|f| f.error.to_string()).collect::<Vec<_>>().join("; ")
    )]
    HostDelete {
        id: String,
        failures: Vec<HostDeleteFailure>,
    },

    #[error("Trashed image {id} cannot be restored: its required-host copy was already deleted")]
    RequiredAssetPurged { id: String },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, VaultError>;
