//! # Core Module
//!
//! The vault engine, independent of any front end.
//!
//! ## Modules
//! - `hasher` - Exact and perceptual fingerprints of raw bytes
//! - `metadata` - File type, dimensions, capture date and EXIF
//! - `detector` - Finds an existing record matching a fingerprint
//! - `hosts` - The required and optional image hosts
//! - `index` - Persistent store of records, trash and collections
//! - `replication` - Fingerprint, deduplicate, upload, persist
//! - `lifecycle` - Trash, restore and permanent delete
//! - `record` - The stored document types
//! - `scanner` - Collects image files from disk for ingest
//! - `vault` - The caller-facing facade

pub mod detector;
pub mod hasher;
pub mod hosts;
pub mod index;
pub mod lifecycle;
pub mod metadata;
pub mod record;
pub mod replication;
pub mod scanner;
pub mod vault;

// Re-export commonly used types
pub use detector::{DuplicateDetector, DuplicateMatch, MatchKind, MatchType};
pub use hasher::{ContentFingerprint, HashAlgorithmKind, HashComputer};
pub use hosts::{HostedAsset, ImageHost};
pub use index::RecordIndex;
pub use lifecycle::EmptyTrashReport;
pub use metadata::MetadataExtractor;
pub use record::{Collection, DisplaySource, ImageRecord, RecordUpdate, TrashRecord};
pub use replication::{FormFields, IngestRequest};
pub use vault::{Vault, VaultBuilder};
