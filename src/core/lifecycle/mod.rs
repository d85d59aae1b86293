//! # Lifecycle Module
//!
//! The trash state machine for stored images.
//!
//! ```text
//! Active --soft_delete--> Trashed --restore--> Active
//!                            |
//!                            +--permanently_delete--> gone (terminal)
//! ```
//!
//! Soft delete and restore only move documents inside the index; hosts
//! are never contacted, so a trashed image stays reachable by URL.
//! Permanent delete is the only operation that changes remote state. Its
//! index entry is removed only once every host delete succeeded or had
//! nothing to delete, so a failed purge can always be retried.

mod report;

pub use report::{EmptyTrashReport, PurgeFailure};

use crate::core::hosts::{DeleteOutcome, ImageHost, IMGBB};
use crate::core::index::RecordIndex;
use crate::core::record::{ImageRecord, TrashRecord};
use crate::error::{HostDeleteFailure, HostError, LifecycleError};
use crate::events::{null_sender, Event, EventSender, LifecycleEvent};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// Default number of trashed records purged at once by `empty_trash`
pub const DEFAULT_PURGE_CONCURRENCY: usize = 4;

/// Moves records between active, trashed and destroyed
pub struct LifecycleManager {
    index: Arc<dyn RecordIndex>,
    required: Arc<dyn ImageHost>,
    optional: Option<Arc<dyn ImageHost>>,
    purge_concurrency: usize,
    events: EventSender,
}

impl LifecycleManager {
    pub fn new(index: Arc<dyn RecordIndex>, required: Arc<dyn ImageHost>) -> Self {
        Self {
            index,
            required,
            optional: None,
            purge_concurrency: DEFAULT_PURGE_CONCURRENCY,
            events: null_sender(),
        }
    }

    pub fn with_optional_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.optional = Some(host);
        self
    }

    /// How many records `empty_trash` purges at once (minimum 1)
    pub fn with_purge_concurrency(mut self, concurrency: usize) -> Self {
        self.purge_concurrency = concurrency.max(1);
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Move an active record to the trash. Hosts are not contacted.
    pub async fn soft_delete(&self, id: &str) -> Result<TrashRecord, LifecycleError> {
        let record = self
            .index
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound { id: id.to_string() })?;

        let trashed = TrashRecord::from_active(record, Uuid::new_v4().to_string(), Utc::now());

        // The trash copy is written first so a failure never loses the record
        self.index.put_trashed(&trashed).await?;
        if let Err(e) = self.index.delete(id).await {
            if let Err(rollback) = self.index.delete_trashed(&trashed.id).await {
                tracing::error!(id, trash_id = %trashed.id, error = %rollback, "record left in both active and trash");
            }
            return Err(e.into());
        }

        tracing::info!(id, trash_id = %trashed.id, "image moved to trash");
        self.events.send(Event::Lifecycle(LifecycleEvent::Trashed {
            id: id.to_string(),
            trash_id: trashed.id.clone(),
        }));

        Ok(trashed)
    }

    /// Soft delete several records, one outcome per id in input order
    pub async fn soft_delete_many(
        &self,
        ids: &[String],
    ) -> Vec<(String, Result<TrashRecord, LifecycleError>)> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            outcomes.push((id.clone(), self.soft_delete(id).await));
        }
        outcomes
    }

    /// Move a trashed record back under its original id
    pub async fn restore(&self, trash_id: &str) -> Result<ImageRecord, LifecycleError> {
        let trashed = self.trashed(trash_id).await?;
        if trashed.pixvid_purged {
            return Err(LifecycleError::RequiredAssetPurged {
                id: trash_id.to_string(),
            });
        }

        let record = trashed.into_active();
        self.index.put(&record).await?;
        if let Err(e) = self.index.delete_trashed(trash_id).await {
            if let Err(rollback) = self.index.delete(&record.id).await {
                tracing::error!(id = %record.id, trash_id, error = %rollback, "record left in both active and trash");
            }
            return Err(e.into());
        }

        tracing::info!(id = %record.id, trash_id, "image restored");
        self.events.send(Event::Lifecycle(LifecycleEvent::Restored {
            trash_id: trash_id.to_string(),
            id: record.id.clone(),
        }));

        Ok(record)
    }

    /// Delete the hosted copies of a trashed record, then the record.
    ///
    /// On any host failure the record stays in the trash and the failures
    /// are returned. Hosts that did delete are marked so a retry skips them.
    pub async fn permanently_delete(&self, trash_id: &str) -> Result<(), LifecycleError> {
        let trashed = self.trashed(trash_id).await?;
        self.purge(trashed).await
    }

    /// Permanently delete every trashed record.
    ///
    /// Records are purged independently; one failing does not stop the rest.
    pub async fn empty_trash(&self) -> Result<EmptyTrashReport, LifecycleError> {
        let trashed = self.index.query_trashed().await?;
        let total = trashed.len();
        tracing::info!(total, concurrency = self.purge_concurrency, "emptying trash");

        let outcomes: Vec<(String, Result<(), LifecycleError>)> = stream::iter(trashed)
            .map(|record| async move {
                let id = record.id.clone();
                (id, self.purge(record).await)
            })
            .buffer_unordered(self.purge_concurrency)
            .collect()
            .await;

        let mut report = EmptyTrashReport::default();
        for (trash_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.destroyed += 1,
                Err(error) => report.failures.push(PurgeFailure { trash_id, error }),
            }
        }
        report.failures.sort_by(|a, b| a.trash_id.cmp(&b.trash_id));

        tracing::info!(destroyed = report.destroyed, failed = report.failures.len(), "trash emptied");
        self.events.send(Event::Lifecycle(LifecycleEvent::TrashEmptied {
            destroyed: report.destroyed,
            failed: report.failures.len(),
        }));

        Ok(report)
    }

    pub async fn get_trashed_by_id(&self, trash_id: &str) -> Result<Option<TrashRecord>, LifecycleError> {
        Ok(self.index.get_trashed(trash_id).await?)
    }

    /// Every trashed record, most recently deleted first
    pub async fn list_trash(&self) -> Result<Vec<TrashRecord>, LifecycleError> {
        Ok(self.index.query_trashed().await?)
    }

    async fn trashed(&self, trash_id: &str) -> Result<TrashRecord, LifecycleError> {
        self.index
            .get_trashed(trash_id)
            .await?
            .ok_or_else(|| LifecycleError::TrashNotFound {
                id: trash_id.to_string(),
            })
    }

    async fn purge(&self, mut trashed: TrashRecord) -> Result<(), LifecycleError> {
        let trash_id = trashed.id.clone();
        let (required, optional) = tokio::join!(self.delete_required(&trashed), self.delete_optional(&trashed));

        let mut failures = Vec::new();
        let mut changed = false;

        match required {
            DeleteOutcome::Deleted => {
                self.report_deleted(&trash_id, self.required.name());
                trashed.pixvid_purged = true;
                changed = true;
            }
            DeleteOutcome::NotApplicable => {}
            DeleteOutcome::Failed(error) => failures.push(HostDeleteFailure {
                host: self.required.name().to_string(),
                error,
            }),
        }

        match optional {
            DeleteOutcome::Deleted => {
                self.report_deleted(&trash_id, self.optional_name());
                trashed.record.set_imgbb(None);
                changed = true;
            }
            DeleteOutcome::NotApplicable => {}
            DeleteOutcome::Failed(error) => failures.push(HostDeleteFailure {
                host: self.optional_name().to_string(),
                error,
            }),
        }

        // Host progress is saved before anything else can fail, so a
        // record whose required copy is gone is never restorable
        if changed {
            self.index.put_trashed(&trashed).await?;
        }

        if failures.is_empty() {
            self.index.delete_trashed(&trash_id).await?;
            tracing::info!(trash_id = %trash_id, original_id = %trashed.original_id, "image permanently deleted");
            self.events.send(Event::Lifecycle(LifecycleEvent::Purged { trash_id }));
            return Ok(());
        }

        for failure in &failures {
            tracing::warn!(trash_id = %trash_id, host = %failure.host, error = %failure.error, "host delete failed, image stays in trash");
            self.events.send(Event::Lifecycle(LifecycleEvent::PurgeFailed {
                trash_id: trash_id.clone(),
                host: failure.host.clone(),
                error: failure.error.to_string(),
            }));
        }

        Err(LifecycleError::HostDelete {
            id: trash_id,
            failures,
        })
    }

    async fn delete_required(&self, trashed: &TrashRecord) -> DeleteOutcome {
        if trashed.pixvid_purged {
            return DeleteOutcome::NotApplicable;
        }
        let token = trashed.record.pixvid_delete_token.as_str();
        if token.is_empty() {
            tracing::warn!(trash_id = %trashed.id, "required host copy has no delete token, skipping");
            return DeleteOutcome::NotApplicable;
        }
        DeleteOutcome::from_result(self.required.delete(token).await)
    }

    async fn delete_optional(&self, trashed: &TrashRecord) -> DeleteOutcome {
        let record = &trashed.record;
        let Some(token) = record.imgbb_delete_token.as_deref().filter(|t| !t.is_empty()) else {
            if record.imgbb_url.is_some() {
                tracing::warn!(trash_id = %trashed.id, "optional host copy has no delete token, skipping");
            }
            return DeleteOutcome::NotApplicable;
        };

        match &self.optional {
            Some(host) => DeleteOutcome::from_result(host.delete(token).await),
            None => DeleteOutcome::Failed(HostError::NotConfigured {
                host: IMGBB.to_string(),
            }),
        }
    }

    fn optional_name(&self) -> &str {
        self.optional.as_ref().map(|h| h.name()).unwrap_or(IMGBB)
    }

    fn report_deleted(&self, trash_id: &str, host: &str) {
        tracing::debug!(trash_id, host, "hosted copy deleted");
        self.events.send(Event::Lifecycle(LifecycleEvent::HostAssetDeleted {
            trash_id: trash_id.to_string(),
            host: host.to_string(),
        }));
    }
}
