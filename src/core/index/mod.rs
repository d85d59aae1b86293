//! # Index Module
//!
//! The record index: the single shared store of active records, trashed
//! records and collections.
//!
//! Writes are atomic per document and keyed by id. Nothing here locks
//! across documents; a duplicate created by a concurrent ingest is at worst
//! a missed duplicate.
//!
//! ## Backends
//! - `SqliteIndex` - Persistent storage using SQLite
//! - `InMemoryIndex` - For testing and ephemeral vaults

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;
pub use traits::RecordIndex;

use crate::core::record::{ImageRecord, TrashRecord};

/// Sort active records newest first
pub(crate) fn sort_newest_first(records: &mut [ImageRecord]) {
    records.sort_by(|a, b| {
        b.internal_added_timestamp
            .cmp(&a.internal_added_timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Sort trashed records most recently deleted first
pub(crate) fn sort_recently_deleted_first(records: &mut [TrashRecord]) {
    records.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
}
