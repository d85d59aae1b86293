//! Host client trait definition.

use super::{HostedAsset, UploadPayload};
use crate::error::HostError;
use async_trait::async_trait;

/// A remote image host.
///
/// Uses `async_trait` so hosts can be held as `Arc<dyn ImageHost>` and
/// swapped for `InMemoryHost` in tests.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Host name for logs and errors (e.g. "pixvid")
    fn name(&self) -> &str;

    /// Upload image bytes and return where they landed
    async fn upload(&self, payload: &UploadPayload) -> Result<HostedAsset, HostError>;

    /// Delete an asset using the credential returned by `upload`.
    ///
    /// Deleting an asset that is already gone succeeds.
    async fn delete(&self, delete_token: &str) -> Result<(), HostError>;
}
