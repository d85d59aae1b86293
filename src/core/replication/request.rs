//! What a caller hands to `ingest`.

use crate::core::metadata::FileHints;
use crate::core::record::parse_tags;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User-supplied fields that accompany an upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub source_image_url: Option<String>,
    pub source_page_url: Option<String>,
    pub page_title: Option<String>,
    /// Free text, called "notes" in older clients
    #[serde(default, alias = "notes")]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub file_name: Option<String>,
    pub collection_id: Option<String>,
}

impl FormFields {
    /// Set tags from a comma-separated string
    pub fn with_tag_list(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }

    /// The given file name, or one derived from the sniffed format
    pub fn resolved_file_name(&self, format: Option<image::ImageFormat>) -> String {
        if let Some(name) = self.file_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let extension = format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin");
        format!("capture.{}", extension)
    }
}

/// One image to ingest
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Arc<[u8]>,
    pub fields: FormFields,
    /// Present when the image came from a file rather than a page capture
    pub file: Option<FileHints>,
}

impl IngestRequest {
    pub fn new(bytes: impl Into<Arc<[u8]>>, fields: FormFields, file: Option<FileHints>) -> Self {
        Self {
            bytes: bytes.into(),
            fields,
            file,
        }
    }

    /// Bare bytes with no fields, as from a right-click capture
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(bytes, FormFields::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_falls_back_to_format() {
        let fields = FormFields::default();
        assert_eq!(fields.resolved_file_name(Some(image::ImageFormat::Png)), "capture.png");
        assert_eq!(fields.resolved_file_name(None), "capture.bin");

        let named = FormFields {
            file_name: Some(" cat.jpg ".to_string()),
            ..FormFields::default()
        };
        assert_eq!(named.resolved_file_name(Some(image::ImageFormat::Png)), "cat.jpg");
    }

    #[test]
    fn tag_list_is_split() {
        let fields = FormFields::default().with_tag_list("a, b,,c ");
        assert_eq!(fields.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn notes_alias_is_accepted() {
        let fields: FormFields = serde_json::from_str(r#"{"notes":"hello"}"#).unwrap();
        assert_eq!(fields.description, "hello");
    }
}
