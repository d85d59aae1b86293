//! ImgBB host client.
//!
//! `POST /1/upload?key=...` with the image in the `image` field. The
//! response is wrapped in a `data` envelope.

use super::{HostedAsset, ImageHost, UploadPayload, IMGBB};
use crate::error::HostError;
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_IMGBB_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

/// The optional image host.
pub struct ImgbbHost {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ImgbbHost {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, DEFAULT_IMGBB_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct UploadData {
    url: String,
    delete_url: Option<String>,
    thumb: Option<Thumb>,
}

#[derive(Deserialize)]
struct Thumb {
    url: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl UploadResponse {
    fn into_asset(self) -> Result<HostedAsset, HostError> {
        if !self.success {
            let message = self
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "upload was not successful".to_string());
            return Err(HostError::Rejected {
                host: IMGBB.to_string(),
                message,
            });
        }

        let data = self.data.ok_or_else(|| invalid("response has no data"))?;
        let Some(delete_token) = data.delete_url.filter(|url| !url.is_empty()) else {
            return Err(HostError::MissingDeleteUrl {
                host: IMGBB.to_string(),
                url: data.url,
            });
        };

        Ok(HostedAsset {
            url: data.url,
            delete_token,
            thumb_url: data.thumb.map(|thumb| thumb.url),
        })
    }
}

fn invalid(reason: &str) -> HostError {
    HostError::InvalidResponse {
        host: IMGBB.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ImageHost for ImgbbHost {
    fn name(&self) -> &str {
        IMGBB
    }

    async fn upload(&self, payload: &UploadPayload) -> Result<HostedAsset, HostError> {
        let part = super::http::file_part(IMGBB, payload)?;
        let form = Form::new().part("image", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HostError::Request {
                host: IMGBB.to_string(),
                source: e,
            })?;

        let body: UploadResponse = super::http::read_json(IMGBB, resp).await?;
        let asset = body.into_asset()?;

        tracing::debug!(url = %asset.url, "imgbb upload complete");
        Ok(asset)
    }

    async fn delete(&self, delete_token: &str) -> Result<(), HostError> {
        super::http::delete_url(&self.client, IMGBB, delete_token, self.timeout).await
    }
}
