//! Event types emitted by the engine.

use serde::{Deserialize, Serialize};

/// Top-level event enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "event", rename_all = "lowercase")]
pub enum Event {
    Ingest(IngestEvent),
    Lifecycle(LifecycleEvent),
}

/// Events emitted while ingesting one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestEvent {
    /// Ingest accepted the bytes
    Started { file_name: String, size_bytes: u64 },
    /// Hashes computed; no network call has been made yet
    Fingerprinted {
        sha256: String,
        perceptual: bool,
    },
    /// An existing record blocks the ingest
    DuplicateFound { sha256: String, existing_id: String },
    /// A host accepted the upload
    HostUploaded { host: String, url: String },
    /// A host rejected the upload or was unreachable
    HostFailed {
        host: String,
        required: bool,
        error: String,
    },
    /// The record is in the index
    Persisted { id: String },
    /// An uploaded asset has no record pointing at it. `delete_token` is
    /// empty when the host never returned one.
    OrphanedAsset {
        host: String,
        url: String,
        delete_token: String,
    },
}

/// Events emitted by trash and delete operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Trashed { id: String, trash_id: String },
    Restored { trash_id: String, id: String },
    HostAssetDeleted { trash_id: String, host: String },
    /// A host delete failed; the record stays in the trash
    PurgeFailed {
        trash_id: String,
        host: String,
        error: String,
    },
    Purged { trash_id: String },
    /// Emptying the trash finished
    TrashEmptied { destroyed: usize, failed: usize },
}
