//! In-memory index implementation.

use super::{sort_newest_first, sort_recently_deleted_first, RecordIndex};
use crate::core::record::{Collection, ImageRecord, TrashRecord};
use crate::error::IndexError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// In-memory index for testing and ephemeral vaults
///
/// Everything is lost when the index is dropped. Writes can be made to
/// fail to exercise the paths where the store rejects a write.
pub struct InMemoryIndex {
    images: RwLock<HashMap<String, ImageRecord>>,
    trash: RwLock<HashMap<String, TrashRecord>>,
    collections: RwLock<HashMap<String, Collection>>,
    fail_puts: AtomicBool,
    fail_trash_deletes: AtomicBool,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            images: RwLock::new(HashMap::new()),
            trash: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
            fail_trash_deletes: AtomicBool::new(false),
        }
    }

    /// Make every following active-record `put` fail (or succeed again)
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every following `delete_trashed` fail (or succeed again)
    pub fn fail_trash_deletes(&self, fail: bool) {
        self.fail_trash_deletes.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(what: &str) -> IndexError {
    IndexError::QueryFailed(format!("{} lock poisoned", what))
}

fn rejected(op: &str) -> IndexError {
    IndexError::QueryFailed(format!("{} rejected by store", op))
}

#[async_trait]
impl RecordIndex for InMemoryIndex {
    async fn put(&self, record: &ImageRecord) -> Result<(), IndexError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(rejected("put"));
        }
        let mut images = self.images.write().map_err(|_| poisoned("images"))?;
        images.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>, IndexError> {
        let images = self.images.read().map_err(|_| poisoned("images"))?;
        Ok(images.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        let mut images = self.images.write().map_err(|_| poisoned("images"))?;
        images.remove(id);
        Ok(())
    }

    async fn query_all(&self) -> Result<Vec<ImageRecord>, IndexError> {
        let images = self.images.read().map_err(|_| poisoned("images"))?;
        let mut records: Vec<ImageRecord> = images.values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn put_trashed(&self, record: &TrashRecord) -> Result<(), IndexError> {
        let mut trash = self.trash.write().map_err(|_| poisoned("trash"))?;
        trash.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_trashed(&self, id: &str) -> Result<Option<TrashRecord>, IndexError> {
        let trash = self.trash.read().map_err(|_| poisoned("trash"))?;
        Ok(trash.get(id).cloned())
    }

    async fn delete_trashed(&self, id: &str) -> Result<(), IndexError> {
        if self.fail_trash_deletes.load(Ordering::SeqCst) {
            return Err(rejected("delete_trashed"));
        }
        let mut trash = self.trash.write().map_err(|_| poisoned("trash"))?;
        trash.remove(id);
        Ok(())
    }

    async fn query_trashed(&self) -> Result<Vec<TrashRecord>, IndexError> {
        let trash = self.trash.read().map_err(|_| poisoned("trash"))?;
        let mut records: Vec<TrashRecord> = trash.values().cloned().collect();
        sort_recently_deleted_first(&mut records);
        Ok(records)
    }

    async fn put_collection(&self, collection: &Collection) -> Result<(), IndexError> {
        let mut collections = self.collections.write().map_err(|_| poisoned("collections"))?;
        collections.insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, IndexError> {
        let collections = self.collections.read().map_err(|_| poisoned("collections"))?;
        Ok(collections.get(id).cloned())
    }

    async fn delete_collection(&self, id: &str) -> Result<(), IndexError> {
        let mut collections = self.collections.write().map_err(|_| poisoned("collections"))?;
        collections.remove(id);
        Ok(())
    }

    async fn query_collections(&self) -> Result<Vec<Collection>, IndexError> {
        let collections = self.collections.read().map_err(|_| poisoned("collections"))?;
        let mut all: Vec<Collection> = collections.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}
