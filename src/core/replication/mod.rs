//! # Replication Module
//!
//! Turns image bytes into a persisted, replicated record.
//!
//! ## Ingest Stages
//! 1. **Fingerprint** - sha256 and perceptual hashes, on a blocking thread
//! 2. **Describe** - file type, dimensions, creation date, EXIF
//! 3. **Check** - duplicate lookup, unless the caller overrides it
//! 4. **Upload** - required and optional host concurrently, then joined
//! 5. **Persist** - one index write
//!
//! Stages 1-3 always finish before any byte leaves the machine, so a
//! detected duplicate never costs host quota.
//!
//! ## Failure Policy
//! - Required host fails: nothing is persisted.
//! - Optional host fails: logged and reported as an event; the record is
//!   stored without its fields.
//! - Index write fails after uploads succeeded: the uploaded assets are
//!   orphans. They are logged at error level with their delete
//!   credentials and reported as events. Nothing deletes them
//!   automatically.
//!
//! Uploads run as spawned tasks. If the caller stops awaiting `ingest`,
//! uploads already issued still complete in the background and their
//! results are discarded.

mod request;

pub use request::{FormFields, IngestRequest};

use crate::core::detector::DuplicateDetector;
use crate::core::hasher::{HashComputer, ImageAnalysis};
use crate::core::hosts::{
    combine_uploads, HostOutcome, HostedAsset, ImageHost, Replicas, UploadPayload,
};
use crate::core::index::RecordIndex;
use crate::core::metadata::{ExtractedMetadata, MetadataExtractor};
use crate::core::record::ImageRecord;
use crate::error::{HostError, IngestError};
use crate::events::{null_sender, Event, EventSender, IngestEvent};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Ingests images into the vault
pub struct ReplicationCoordinator {
    hasher: Arc<HashComputer>,
    detector: DuplicateDetector,
    index: Arc<dyn RecordIndex>,
    required: Arc<dyn ImageHost>,
    optional: Option<Arc<dyn ImageHost>>,
    events: EventSender,
}

impl ReplicationCoordinator {
    pub fn new(index: Arc<dyn RecordIndex>, required: Arc<dyn ImageHost>) -> Self {
        Self {
            hasher: Arc::new(HashComputer::new()),
            detector: DuplicateDetector::default(),
            index,
            required,
            optional: None,
            events: null_sender(),
        }
    }

    /// Replicate to a best-effort second host as well
    pub fn with_optional_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.optional = Some(host);
        self
    }

    pub fn with_detector(mut self, detector: DuplicateDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    /// Store an image.
    ///
    /// Returns `IngestError::DuplicateFound` when the image is already in
    /// the vault, unless `ignore_duplicate` is set.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        ignore_duplicate: bool,
    ) -> Result<ImageRecord, IngestError> {
        let IngestRequest { bytes, fields, file } = request;
        if bytes.is_empty() {
            return Err(IngestError::EmptyInput);
        }

        self.events.send(Event::Ingest(IngestEvent::Started {
            file_name: fields.file_name.clone().unwrap_or_default(),
            size_bytes: bytes.len() as u64,
        }));

        let analysis = self.analyze(Arc::clone(&bytes)).await?;
        let metadata = MetadataExtractor::extract(&bytes, file.as_ref(), &analysis);
        let sha256 = analysis.fingerprint.sha256.clone();

        self.events.send(Event::Ingest(IngestEvent::Fingerprinted {
            sha256: sha256.clone(),
            perceptual: analysis.fingerprint.perceptual.is_some(),
        }));

        if ignore_duplicate {
            tracing::debug!(sha256 = %sha256, "duplicate check skipped on request");
        } else if let Some(existing) = self
            .detector
            .find_duplicate(self.index.as_ref(), &analysis.fingerprint)
            .await
            .map_err(IngestError::IndexRead)?
        {
            tracing::info!(sha256 = %sha256, existing = %existing.record.id, kind = %existing.kind, "duplicate blocks ingest");
            self.events.send(Event::Ingest(IngestEvent::DuplicateFound {
                sha256,
                existing_id: existing.record.id.clone(),
            }));
            return Err(IngestError::DuplicateFound {
                existing: Box::new(existing),
            });
        }

        let payload = UploadPayload {
            bytes,
            file_name: fields.resolved_file_name(analysis.format),
            mime_type: metadata.mime_type().map(str::to_string),
        };

        let replicas = self.replicate(payload).await?;
        let record = build_record(&fields, &analysis, metadata, &replicas);

        if let Err(e) = self.index.put(&record).await {
            tracing::error!(sha256 = %record.sha256, error = %e, "index write failed after upload");
            self.report_orphan(self.required.name(), &replicas.pixvid);
            if let Some(asset) = &replicas.imgbb {
                self.report_orphan(self.optional_name(), asset);
            }
            return Err(IngestError::IndexWrite(e));
        }

        tracing::info!(id = %record.id, sha256 = %record.sha256, imgbb = record.imgbb_url.is_some(), "image stored");
        self.events.send(Event::Ingest(IngestEvent::Persisted {
            id: record.id.clone(),
        }));

        Ok(record)
    }

    async fn analyze(&self, bytes: Arc<[u8]>) -> Result<ImageAnalysis, IngestError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.analyze(&bytes))
            .await
            .map_err(|e| IngestError::Fingerprint(e.to_string()))
    }

    /// Upload to both hosts concurrently and combine the outcomes
    async fn replicate(&self, payload: UploadPayload) -> Result<Replicas, IngestError> {
        let payload = Arc::new(payload);
        let required_task = spawn_upload(Arc::clone(&self.required), Arc::clone(&payload));
        let optional_task = self
            .optional
            .as_ref()
            .map(|host| spawn_upload(Arc::clone(host), Arc::clone(&payload)));

        let (required, optional) = tokio::join!(
            join_upload(self.required.name(), required_task),
            async {
                match optional_task {
                    Some(task) => join_upload(self.optional_name(), task).await,
                    None => HostOutcome::Skipped,
                }
            }
        );

        self.report_upload(self.required.name(), true, &required);
        self.report_upload(self.optional_name(), false, &optional);

        // A required failure leaves any optional upload without a record
        if let (HostOutcome::Failed(_), HostOutcome::Succeeded(asset)) = (&required, &optional) {
            self.report_orphan(self.optional_name(), asset);
        }

        match combine_uploads(required, optional) {
            Ok((replicas, _optional_error)) => Ok(replicas),
            Err(e) => Err(IngestError::RequiredHostUpload(e)),
        }
    }

    fn optional_name(&self) -> &str {
        self.optional.as_ref().map(|h| h.name()).unwrap_or("optional")
    }

    fn report_upload(&self, host: &str, required: bool, outcome: &HostOutcome) {
        match outcome {
            HostOutcome::Succeeded(asset) => {
                tracing::debug!(host, url = %asset.url, "upload succeeded");
                self.events.send(Event::Ingest(IngestEvent::HostUploaded {
                    host: host.to_string(),
                    url: asset.url.clone(),
                }));
            }
            HostOutcome::Failed(error) => {
                if required {
                    tracing::error!(host, error = %error, "required host upload failed");
                } else {
                    tracing::warn!(host, error = %error, "optional host upload failed, continuing without it");
                }
                self.events.send(Event::Ingest(IngestEvent::HostFailed {
                    host: host.to_string(),
                    required,
                    error: error.to_string(),
                }));
                if let Some(url) = error.stranded_url() {
                    self.report_orphan(
                        host,
                        &HostedAsset {
                            url: url.to_string(),
                            delete_token: String::new(),
                            thumb_url: None,
                        },
                    );
                }
            }
            HostOutcome::Skipped => {}
        }
    }

    fn report_orphan(&self, host: &str, asset: &HostedAsset) {
        tracing::error!(
            host,
            url = %asset.url,
            delete_token = %asset.delete_token,
            "orphaned hosted asset: uploaded but not indexed"
        );
        self.events.send(Event::Ingest(IngestEvent::OrphanedAsset {
            host: host.to_string(),
            url: asset.url.clone(),
            delete_token: asset.delete_token.clone(),
        }));
    }
}

fn spawn_upload(
    host: Arc<dyn ImageHost>,
    payload: Arc<UploadPayload>,
) -> JoinHandle<Result<HostedAsset, HostError>> {
    tokio::spawn(async move { host.upload(&payload).await })
}

async fn join_upload(host: &str, task: JoinHandle<Result<HostedAsset, HostError>>) -> HostOutcome {
    match task.await {
        Ok(result) => HostOutcome::from_result(result),
        Err(e) => HostOutcome::Failed(HostError::Interrupted {
            host: host.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn build_record(
    fields: &FormFields,
    analysis: &ImageAnalysis,
    metadata: ExtractedMetadata,
    replicas: &Replicas,
) -> ImageRecord {
    let mut record = ImageRecord {
        id: Uuid::new_v4().to_string(),
        source_image_url: fields.source_image_url.clone(),
        source_page_url: fields.source_page_url.clone(),
        page_title: fields.page_title.clone(),
        description: fields.description.clone(),
        tags: fields.tags.clone(),
        file_name: fields.resolved_file_name(analysis.format),
        file_type: metadata.file_type,
        file_type_source: metadata.file_type_source,
        file_size: metadata.file_size,
        width: metadata.width,
        height: metadata.height,
        creation_date: metadata.creation_date,
        creation_date_source: metadata.creation_date_source,
        sha256: String::new(),
        p_hash: None,
        a_hash: None,
        d_hash: None,
        pixvid_url: replicas.pixvid.url.clone(),
        pixvid_delete_token: replicas.pixvid.delete_token.clone(),
        imgbb_url: None,
        imgbb_delete_token: None,
        imgbb_thumb_url: None,
        collection_id: fields.collection_id.clone(),
        internal_added_timestamp: Utc::now(),
        exif_metadata_map: metadata.exif,
    };
    record.set_fingerprint(&analysis.fingerprint);
    record.set_imgbb(replicas.imgbb.clone());
    record
}
