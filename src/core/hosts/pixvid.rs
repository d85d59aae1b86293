//! Pixvid host client (Chevereto upload API).
//!
//! Uploads a multipart form with the image in the `source` field and the
//! API key in the `X-API-Key` header.

use super::{HostedAsset, ImageHost, UploadPayload, PIXVID};
use crate::error::HostError;
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_PIXVID_ENDPOINT: &str = "https://pixvid.org/api/1/upload";

/// The required image host.
pub struct PixvidHost {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl PixvidHost {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, DEFAULT_PIXVID_ENDPOINT)
    }

    /// Point at a self-hosted Chevereto instance
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
    status_code: Option<u16>,
    image: Option<UploadedImage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct UploadedImage {
    url: String,
    delete_url: Option<String>,
    thumb: Option<Thumb>,
}

/// Chevereto versions disagree on whether `thumb` is a URL or an object
#[derive(Deserialize)]
#[serde(untagged)]
enum Thumb {
    Url(String),
    Object { url: String },
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl UploadResponse {
    fn into_asset(self) -> Result<HostedAsset, HostError> {
        if let Some(error) = self.error {
            return Err(HostError::Rejected {
                host: PIXVID.to_string(),
                message: error.message,
            });
        }

        if let Some(code) = self.status_code.filter(|code| *code != 200) {
            return Err(HostError::Rejected {
                host: PIXVID.to_string(),
                message: format!("upload reported status code {}", code),
            });
        }

        let image = self.image.ok_or_else(|| invalid("response has no image"))?;
        if image.url.is_empty() {
            return Err(invalid("response has an empty image URL"));
        }

        let Some(delete_token) = image.delete_url.filter(|url| !url.is_empty()) else {
            return Err(HostError::MissingDeleteUrl {
                host: PIXVID.to_string(),
                url: image.url,
            });
        };

        let thumb_url = image.thumb.map(|thumb| match thumb {
            Thumb::Url(url) | Thumb::Object { url } => url,
        });

        Ok(HostedAsset {
            url: image.url,
            delete_token,
            thumb_url,
        })
    }
}

fn invalid(reason: &str) -> HostError {
    HostError::InvalidResponse {
        host: PIXVID.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ImageHost for PixvidHost {
    fn name(&self) -> &str {
        PIXVID
    }

    async fn upload(&self, payload: &UploadPayload) -> Result<HostedAsset, HostError> {
        let part = super::http::file_part(PIXVID, payload)?;
        let form = Form::new().part("source", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HostError::Request {
                host: PIXVID.to_string(),
                source: e,
            })?;

        let body: UploadResponse = super::http::read_json(PIXVID, resp).await?;
        let asset = body.into_asset()?;

        tracing::debug!(url = %asset.url, "pixvid upload complete");
        Ok(asset)
    }

    async fn delete(&self, delete_token: &str) -> Result<(), HostError> {
        super::http::delete_url(&self.client, PIXVID, delete_token, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<HostedAsset, HostError> {
        serde_json::from_str::<UploadResponse>(json).unwrap().into_asset()
    }

    #[test]
    fn parses_chevereto_response() {
        let asset = parse(
            r#"{"status_code":200,"image":{"url":"https://pixvid.org/i/a.png",
                "delete_url":"https://pixvid.org/i/a/delete/xyz",
                "thumb":{"url":"https://pixvid.org/i/a.th.png"}}}"#,
        )
        .unwrap();

        assert_eq!(asset.url, "https://pixvid.org/i/a.png");
        assert_eq!(asset.delete_token, "https://pixvid.org/i/a/delete/xyz");
        assert_eq!(asset.thumb_url.as_deref(), Some("https://pixvid.org/i/a.th.png"));
    }

    #[test]
    fn accepts_thumb_as_plain_url() {
        let asset = parse(r#"{"image":{"url":"u","delete_url":"d","thumb":"t"}}"#).unwrap();
        assert_eq!(asset.thumb_url.as_deref(), Some("t"));
    }

    #[test]
    fn missing_delete_url_keeps_the_stored_url() {
        let err = parse(r#"{"status_code":200,"image":{"url":"https://pixvid.org/i/a.png"}}"#).unwrap_err();
        assert!(matches!(err, HostError::MissingDeleteUrl { .. }));
        assert_eq!(err.stranded_url(), Some("https://pixvid.org/i/a.png"));
    }

    #[test]
    fn api_error_is_rejected() {
        let result = parse(r#"{"status_code":400,"error":{"message":"Invalid API key"}}"#);
        match result {
            Err(HostError::Rejected { message, .. }) => assert_eq!(message, "Invalid API key"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
