//! Record index trait definition.

use crate::core::record::{Collection, ImageRecord, TrashRecord};
use crate::error::IndexError;
use async_trait::async_trait;

/// A document store holding the vault's records.
///
/// Three logical collections share one backend: active images, trashed
/// images and collections. `put*` inserts or replaces by id.
#[async_trait]
pub trait RecordIndex: Send + Sync {
    /// Insert or replace an active record
    async fn put(&self, record: &ImageRecord) -> Result<(), IndexError>;

    /// Get an active record by id
    async fn get(&self, id: &str) -> Result<Option<ImageRecord>, IndexError>;

    /// Remove an active record. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), IndexError>;

    /// Every active record, newest first
    async fn query_all(&self) -> Result<Vec<ImageRecord>, IndexError>;

    /// Active records whose content hash equals `sha256`, newest first
    async fn find_by_sha256(&self, sha256: &str) -> Result<Vec<ImageRecord>, IndexError> {
        // Default implementation: scan everything
        let records = self.query_all().await?;
        Ok(records.into_iter().filter(|r| r.sha256 == sha256).collect())
    }

    /// Insert or replace a trashed record
    async fn put_trashed(&self, record: &TrashRecord) -> Result<(), IndexError>;

    /// Get a trashed record by its trash id
    async fn get_trashed(&self, id: &str) -> Result<Option<TrashRecord>, IndexError>;

    /// Remove a trashed record. Removing a missing id is not an error.
    async fn delete_trashed(&self, id: &str) -> Result<(), IndexError>;

    /// Every trashed record, most recently deleted first
    async fn query_trashed(&self) -> Result<Vec<TrashRecord>, IndexError>;

    /// Insert or replace a collection
    async fn put_collection(&self, collection: &Collection) -> Result<(), IndexError>;

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, IndexError>;

    async fn delete_collection(&self, id: &str) -> Result<(), IndexError>;

    /// Every collection, oldest first
    async fn query_collections(&self) -> Result<Vec<Collection>, IndexError>;
}
