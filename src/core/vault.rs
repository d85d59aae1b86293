//! The caller-facing operation surface.
//!
//! `Vault` wires one index and two hosts into a replication coordinator
//! and a lifecycle manager, and adds record editing and collections on
//! top. It holds no state of its own beyond those collaborators.

use crate::config::VaultConfig;
use crate::core::detector::{DuplicateDetector, ThresholdStrategy};
use crate::core::hosts::{ImageHost, ImgbbHost, PixvidHost};
use crate::core::index::{RecordIndex, SqliteIndex};
use crate::core::lifecycle::{EmptyTrashReport, LifecycleManager, DEFAULT_PURGE_CONCURRENCY};
use crate::core::record::{Collection, DisplaySource, ImageRecord, RecordUpdate, TrashRecord};
use crate::core::replication::{IngestRequest, ReplicationCoordinator};
use crate::error::{LifecycleError, Result, VaultError};
use crate::events::{null_sender, EventSender};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Builder for `Vault`
pub struct VaultBuilder {
    index: Arc<dyn RecordIndex>,
    required: Arc<dyn ImageHost>,
    optional: Option<Arc<dyn ImageHost>>,
    detector: DuplicateDetector,
    purge_concurrency: usize,
    display_source: DisplaySource,
    events: EventSender,
}

impl VaultBuilder {
    pub fn new(index: Arc<dyn RecordIndex>, required: Arc<dyn ImageHost>) -> Self {
        Self {
            index,
            required,
            optional: None,
            detector: DuplicateDetector::default(),
            purge_concurrency: DEFAULT_PURGE_CONCURRENCY,
            display_source: DisplaySource::default(),
            events: null_sender(),
        }
    }

    /// Add the best-effort second host
    pub fn optional_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.optional = Some(host);
        self
    }

    /// Set the duplicate detector
    pub fn detector(mut self, detector: DuplicateDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Set how many records `empty_trash` purges at once
    pub fn purge_concurrency(mut self, concurrency: usize) -> Self {
        self.purge_concurrency = concurrency;
        self
    }

    /// Set the host whose URL is shown first
    pub fn display_source(mut self, source: DisplaySource) -> Self {
        self.display_source = source;
        self
    }

    /// Send progress events to `events`
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Vault {
        let mut replication = ReplicationCoordinator::new(Arc::clone(&self.index), Arc::clone(&self.required))
            .with_detector(self.detector)
            .with_events(self.events.clone());
        let mut lifecycle = LifecycleManager::new(Arc::clone(&self.index), self.required)
            .with_purge_concurrency(self.purge_concurrency)
            .with_events(self.events);

        if let Some(host) = self.optional {
            replication = replication.with_optional_host(Arc::clone(&host));
            lifecycle = lifecycle.with_optional_host(host);
        }

        Vault {
            index: self.index,
            replication,
            lifecycle,
            display_source: self.display_source,
        }
    }
}

/// An image vault
pub struct Vault {
    index: Arc<dyn RecordIndex>,
    replication: ReplicationCoordinator,
    lifecycle: LifecycleManager,
    display_source: DisplaySource,
}

impl Vault {
    pub fn builder(index: Arc<dyn RecordIndex>, required: Arc<dyn ImageHost>) -> VaultBuilder {
        VaultBuilder::new(index, required)
    }

    /// Open the SQLite index and HTTP hosts named by `config`.
    ///
    /// The optional host is used only when enabled and given an API key.
    pub fn from_config(config: &VaultConfig, events: EventSender) -> Result<Self> {
        let index = SqliteIndex::open(&config.index.path)?;

        let pixvid_key = config.require_pixvid_key()?;
        let pixvid = PixvidHost::with_endpoint(pixvid_key, config.pixvid_endpoint())
            .with_timeout(Duration::from_secs(config.hosts.pixvid.timeout_secs));

        let detector = DuplicateDetector::new(
            ThresholdStrategy::new(config.duplicates.threshold),
            config.duplicates.algorithms.clone(),
        );

        let mut builder = VaultBuilder::new(Arc::new(index), Arc::new(pixvid))
            .detector(detector)
            .purge_concurrency(config.lifecycle.purge_concurrency)
            .display_source(config.display.source)
            .events(events);

        let imgbb = &config.hosts.imgbb;
        match imgbb.key() {
            Some(key) if imgbb.is_configured() => {
                let host = ImgbbHost::with_endpoint(key, config.imgbb_endpoint())
                    .with_timeout(Duration::from_secs(imgbb.timeout_secs));
                builder = builder.optional_host(Arc::new(host));
            }
            _ => tracing::info!("imgbb not configured, storing on pixvid only"),
        }

        Ok(builder.build())
    }

    /// Store an image. See `ReplicationCoordinator::ingest`.
    pub async fn ingest(&self, request: IngestRequest, ignore_duplicate: bool) -> Result<ImageRecord> {
        if let Some(collection_id) = &request.fields.collection_id {
            self.require_collection(collection_id).await?;
        }
        Ok(self.replication.ingest(request, ignore_duplicate).await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ImageRecord>> {
        Ok(self.index.get(id).await?)
    }

    /// Every active record, newest first
    pub async fn list(&self) -> Result<Vec<ImageRecord>> {
        Ok(self.index.query_all().await?)
    }

    /// Active records in one collection, newest first
    pub async fn list_collection(&self, collection_id: &str) -> Result<Vec<ImageRecord>> {
        let records = self.index.query_all().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.collection_id.as_deref() == Some(collection_id))
            .collect())
    }

    /// Edit the user-facing fields of an active record
    pub async fn update(&self, id: &str, update: &RecordUpdate) -> Result<ImageRecord> {
        let mut record = self
            .index
            .get(id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound { id: id.to_string() })?;

        if let Some(Some(collection_id)) = &update.collection_id {
            self.require_collection(collection_id).await?;
        }

        if update.is_empty() {
            return Ok(record);
        }

        record.apply(update);
        self.index.put(&record).await?;
        tracing::info!(id, "image updated");
        Ok(record)
    }

    pub async fn soft_delete(&self, id: &str) -> Result<TrashRecord> {
        Ok(self.lifecycle.soft_delete(id).await?)
    }

    pub async fn soft_delete_many(&self, ids: &[String]) -> Vec<(String, std::result::Result<TrashRecord, LifecycleError>)> {
        self.lifecycle.soft_delete_many(ids).await
    }

    pub async fn restore(&self, trash_id: &str) -> Result<ImageRecord> {
        Ok(self.lifecycle.restore(trash_id).await?)
    }

    pub async fn permanently_delete(&self, trash_id: &str) -> Result<()> {
        Ok(self.lifecycle.permanently_delete(trash_id).await?)
    }

    pub async fn empty_trash(&self) -> Result<EmptyTrashReport> {
        Ok(self.lifecycle.empty_trash().await?)
    }

    pub async fn get_trashed_by_id(&self, trash_id: &str) -> Result<Option<TrashRecord>> {
        Ok(self.lifecycle.get_trashed_by_id(trash_id).await?)
    }

    pub async fn list_trash(&self) -> Result<Vec<TrashRecord>> {
        Ok(self.lifecycle.list_trash().await?)
    }

    pub async fn create_collection(&self, name: &str, description: &str) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::InvalidInput("collection name cannot be empty".to_string()));
        }

        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.trim().to_string(),
            created_at: Utc::now(),
        };
        self.index.put_collection(&collection).await?;
        tracing::info!(id = %collection.id, name = %collection.name, "collection created");
        Ok(collection)
    }

    pub async fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        Ok(self.index.get_collection(id).await?)
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.index.query_collections().await?)
    }

    /// Delete a collection. Its images stay; they just lose the reference.
    pub async fn delete_collection(&self, id: &str) -> Result<()> {
        self.require_collection(id).await?;

        let mut detached = 0usize;
        for mut record in self.index.query_all().await? {
            if record.collection_id.as_deref() == Some(id) {
                record.collection_id = None;
                self.index.put(&record).await?;
                detached += 1;
            }
        }
        for mut trashed in self.index.query_trashed().await? {
            if trashed.record.collection_id.as_deref() == Some(id) {
                trashed.record.collection_id = None;
                self.index.put_trashed(&trashed).await?;
                detached += 1;
            }
        }

        self.index.delete_collection(id).await?;
        tracing::info!(id, detached, "collection deleted");
        Ok(())
    }

    /// URL to show for a record, per the configured display source
    pub fn display_url<'a>(&self, record: &'a ImageRecord) -> &'a str {
        record.display_url(self.display_source)
    }

    pub fn detector(&self) -> &DuplicateDetector {
        self.replication.detector()
    }

    async fn require_collection(&self, id: &str) -> Result<Collection> {
        self.index
            .get_collection(id)
            .await?
            .ok_or_else(|| VaultError::CollectionNotFound { id: id.to_string() })
    }
}
