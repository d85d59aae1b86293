//! In-memory host implementation.
//!
//! Stores assets in a `HashMap` keyed by delete token. Failures can be
//! switched on per operation to exercise partial-success paths.

use super::{HostedAsset, ImageHost, UploadPayload};
use crate::error::HostError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// A fake image host for tests and offline runs
pub struct InMemoryHost {
    name: String,
    assets: RwLock<HashMap<String, HostedAsset>>,
    failing_tokens: RwLock<HashSet<String>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    upload_delay: Option<Duration>,
    uploads: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryHost {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            assets: RwLock::new(HashMap::new()),
            failing_tokens: RwLock::new(HashSet::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            upload_delay: None,
            uploads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Sleep before each upload completes
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Make every following upload fail (or succeed again)
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make every following delete fail (or succeed again)
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make deletes of one asset fail
    pub fn fail_delete_for(&self, delete_token: &str) {
        if let Ok(mut tokens) = self.failing_tokens.write() {
            tokens.insert(delete_token.to_string());
        }
    }

    /// Number of assets currently stored
    pub fn asset_count(&self) -> usize {
        self.assets.read().map(|assets| assets.len()).unwrap_or(0)
    }

    /// Whether an asset with this delete token is stored
    pub fn contains(&self, delete_token: &str) -> bool {
        self.assets
            .read()
            .map(|assets| assets.contains_key(delete_token))
            .unwrap_or(false)
    }

    /// Total upload attempts, failed ones included
    pub fn upload_attempts(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Total delete attempts, failed ones included
    pub fn delete_attempts(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn lock_error(&self) -> HostError {
        HostError::Rejected {
            host: self.name.clone(),
            message: "asset map lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl ImageHost for InMemoryHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, payload: &UploadPayload) -> Result<HostedAsset, HostError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(HostError::Status {
                host: self.name.clone(),
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let key = format!("{}-{}", n, payload.file_name);
        let asset = HostedAsset {
            url: format!("https://{}.test/i/{}", self.name, key),
            delete_token: format!("{}-delete-{}", self.name, key),
            thumb_url: Some(format!("https://{}.test/t/{}", self.name, key)),
        };

        self.assets
            .write()
            .map_err(|_| self.lock_error())?
            .insert(asset.delete_token.clone(), asset.clone());

        Ok(asset)
    }

    async fn delete(&self, delete_token: &str) -> Result<(), HostError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);

        let targeted = self
            .failing_tokens
            .read()
            .map(|tokens| tokens.contains(delete_token))
            .unwrap_or(false);

        if targeted || self.fail_deletes.load(Ordering::SeqCst) {
            return Err(HostError::Status {
                host: self.name.clone(),
                status: 500,
                body: "delete failed".to_string(),
            });
        }

        // Unknown tokens are treated as already deleted
        self.assets
            .write()
            .map_err(|_| self.lock_error())?
            .remove(delete_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn payload(name: &str) -> UploadPayload {
        UploadPayload {
            bytes: Arc::from(vec![1u8, 2, 3]),
            file_name: name.to_string(),
            mime_type: Some("image/png".to_string()),
        }
    }

    #[tokio::test]
    async fn upload_then_delete() {
        let host = InMemoryHost::new("pixvid");
        let asset = host.upload(&payload("a.png")).await.unwrap();

        assert!(host.contains(&asset.delete_token));
        assert_eq!(host.asset_count(), 1);

        host.delete(&asset.delete_token).await.unwrap();
        assert_eq!(host.asset_count(), 0);
    }

    #[tokio::test]
    async fn uploads_get_distinct_tokens() {
        let host = InMemoryHost::new("pixvid");
        let a = host.upload(&payload("a.png")).await.unwrap();
        let b = host.upload(&payload("a.png")).await.unwrap();
        assert_ne!(a.delete_token, b.delete_token);
    }

    #[tokio::test]
    async fn upload_failure_can_be_injected() {
        let host = InMemoryHost::new("imgbb");
        host.fail_uploads(true);

        let err = host.upload(&payload("a.png")).await.unwrap_err();
        assert_eq!(err.host(), "imgbb");
        assert_eq!(host.asset_count(), 0);
        assert_eq!(host.upload_attempts(), 1);
    }

    #[tokio::test]
    async fn targeted_delete_failure_keeps_asset() {
        let host = InMemoryHost::new("pixvid");
        let asset = host.upload(&payload("a.png")).await.unwrap();
        host.fail_delete_for(&asset.delete_token);

        assert!(host.delete(&asset.delete_token).await.is_err());
        assert!(host.contains(&asset.delete_token));
    }

    #[tokio::test]
    async fn deleting_unknown_asset_succeeds() {
        let host = InMemoryHost::new("pixvid");
        assert!(host.delete("never-uploaded").await.is_ok());
    }
}
