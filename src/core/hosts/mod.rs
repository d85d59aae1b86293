//! # Hosts Module
//!
//! The two remote image hosts a record is replicated to.
//!
//! ## Roles
//! - **Pixvid** (required) - its upload must succeed for an ingest to succeed
//! - **ImgBB** (optional) - best effort; a failure only leaves its fields empty
//!
//! Every successful upload returns a delete credential. It is stored on the
//! record verbatim: without it the hosted copy can never be removed.
//!
//! ## Backends
//! - `PixvidHost` / `ImgbbHost` - HTTP clients for the real services
//! - `InMemoryHost` - for testing and offline runs

mod http;
mod imgbb;
mod memory;
mod pixvid;
mod traits;

pub use imgbb::{ImgbbHost, DEFAULT_IMGBB_ENDPOINT};
pub use memory::InMemoryHost;
pub use pixvid::{PixvidHost, DEFAULT_PIXVID_ENDPOINT};
pub use traits::ImageHost;

use crate::error::HostError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Host name used for the required host in logs, events and errors
pub const PIXVID: &str = "pixvid";
/// Host name used for the optional host in logs, events and errors
pub const IMGBB: &str = "imgbb";

/// Image bytes on their way to a host
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub bytes: Arc<[u8]>,
    pub file_name: String,
    pub mime_type: Option<String>,
}

/// A copy of an image living on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedAsset {
    /// Public URL of the full image
    pub url: String,
    /// Token or URL that deletes the asset
    pub delete_token: String,
    /// Thumbnail URL, when the host makes one
    pub thumb_url: Option<String>,
}

/// Result of one host's upload
#[derive(Debug)]
pub enum HostOutcome {
    Succeeded(HostedAsset),
    /// The host is not configured, so nothing was attempted
    Skipped,
    Failed(HostError),
}

impl HostOutcome {
    pub fn from_result(result: Result<HostedAsset, HostError>) -> Self {
        match result {
            Ok(asset) => HostOutcome::Succeeded(asset),
            Err(error) => HostOutcome::Failed(error),
        }
    }
}

/// Result of one host's delete
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// The record holds no asset on this host
    NotApplicable,
    Failed(HostError),
}

impl DeleteOutcome {
    pub fn from_result(result: Result<(), HostError>) -> Self {
        match result {
            Ok(()) => DeleteOutcome::Deleted,
            Err(error) => DeleteOutcome::Failed(error),
        }
    }
}

/// Assets of one record after both uploads were joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replicas {
    pub pixvid: HostedAsset,
    pub imgbb: Option<HostedAsset>,
}

/// Combine the two upload outcomes.
///
/// The required host decides success. The optional host's failure is
/// returned alongside so the caller can report it, never as an error.
pub fn combine_uploads(
    required: HostOutcome,
    optional: HostOutcome,
) -> Result<(Replicas, Option<HostError>), HostError> {
    let pixvid = match required {
        HostOutcome::Succeeded(asset) => asset,
        HostOutcome::Skipped => {
            return Err(HostError::NotConfigured {
                host: PIXVID.to_string(),
            })
        }
        HostOutcome::Failed(error) => return Err(error),
    };

    let (imgbb, optional_error) = match optional {
        HostOutcome::Succeeded(asset) => (Some(asset), None),
        HostOutcome::Skipped => (None, None),
        HostOutcome::Failed(error) => (None, Some(error)),
    };

    Ok((Replicas { pixvid, imgbb }, optional_error))
}
