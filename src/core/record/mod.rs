//! # Record Module
//!
//! The documents kept in the record index.
//!
//! - `ImageRecord` - one per stored image, replicated to one or two hosts
//! - `TrashRecord` - an `ImageRecord` moved to the trash, with `original_id`
//!   and `deleted_at`
//! - `Collection` - a named group that images point at (weak reference)
//!
//! Field names serialize in camelCase to match the documents the browser
//! extension reads.

use crate::core::hasher::{ContentFingerprint, PerceptualHashes};
use crate::core::hosts::HostedAsset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw embedded metadata, tag name to displayed value. Passed through untouched.
pub type ExifMap = BTreeMap<String, String>;

/// Where `file_type` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileTypeSource {
    /// MIME type declared by the uploaded file
    FileObject,
    /// Signature embedded in the image data
    Exif,
    Unknown,
}

/// Where `creation_date` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationDateSource {
    /// Embedded original-capture timestamp
    Exif,
    /// OS last-modified time of the uploaded file
    FileLastModified,
    Unknown,
}

/// Which host's URL a viewer should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySource {
    #[default]
    Pixvid,
    Imgbb,
}

/// One stored image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,

    pub file_name: String,
    pub file_type: String,
    pub file_type_source: FileTypeSource,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    pub creation_date_source: CreationDateSource,

    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_hash: Option<String>,

    pub pixvid_url: String,
    pub pixvid_delete_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgbb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgbb_delete_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgbb_thumb_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub internal_added_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub exif_metadata_map: ExifMap,
}

impl ImageRecord {
    /// Perceptual fingerprints, if the image was decodable when stored
    pub fn perceptual_hashes(&self) -> Option<PerceptualHashes> {
        PerceptualHashes::from_hex(
            self.a_hash.as_deref(),
            self.d_hash.as_deref(),
            self.p_hash.as_deref(),
        )
    }

    /// Copy fingerprint fields onto the record
    pub(crate) fn set_fingerprint(&mut self, fingerprint: &ContentFingerprint) {
        use crate::core::hasher::PerceptualHash;

        self.sha256 = fingerprint.sha256.clone();
        if let Some(hashes) = &fingerprint.perceptual {
            self.a_hash = Some(hashes.a_hash.to_hex());
            self.d_hash = Some(hashes.d_hash.to_hex());
            self.p_hash = Some(hashes.p_hash.to_hex());
        }
    }

    /// Copy the optional host's asset onto the record
    pub(crate) fn set_imgbb(&mut self, asset: Option<HostedAsset>) {
        match asset {
            Some(asset) => {
                self.imgbb_url = Some(asset.url);
                self.imgbb_delete_token = Some(asset.delete_token);
                self.imgbb_thumb_url = asset.thumb_url;
            }
            None => {
                self.imgbb_url = None;
                self.imgbb_delete_token = None;
                self.imgbb_thumb_url = None;
            }
        }
    }

    /// URL to show, preferring `source` and falling back to the other host
    pub fn display_url(&self, source: DisplaySource) -> &str {
        match (source, self.imgbb_url.as_deref()) {
            (DisplaySource::Imgbb, Some(url)) => url,
            _ => &self.pixvid_url,
        }
    }

    /// Apply a user edit
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(url) = &update.source_image_url {
            self.source_image_url = non_empty(url);
        }
        if let Some(url) = &update.source_page_url {
            self.source_page_url = non_empty(url);
        }
        if let Some(title) = &update.page_title {
            self.page_title = non_empty(title);
        }
        if let Some(collection_id) = &update.collection_id {
            self.collection_id = collection_id.clone();
        }
    }
}

/// A user edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub source_image_url: Option<String>,
    pub source_page_url: Option<String>,
    pub page_title: Option<String>,
    /// `Some(None)` removes the image from its collection
    pub collection_id: Option<Option<String>>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An `ImageRecord` in the trash. Host fields are carried over unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashRecord {
    /// Key of this document in the trash
    pub id: String,
    /// Key the record had while active, and gets back on restore
    pub original_id: String,
    pub deleted_at: DateTime<Utc>,
    /// Set once the required host's copy is gone after a partial purge
    #[serde(default)]
    pub pixvid_purged: bool,
    pub record: ImageRecord,
}

impl TrashRecord {
    pub fn from_active(record: ImageRecord, trash_id: String, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: trash_id,
            original_id: record.id.clone(),
            deleted_at,
            pixvid_purged: false,
            record,
        }
    }

    /// The record as it was before it was trashed
    pub fn into_active(self) -> ImageRecord {
        let mut record = self.record;
        record.id = self.original_id;
        record
    }
}

/// A named group of images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Split a comma-separated tag string, trimming and dropping empties
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn tags_are_trimmed_and_empties_dropped() {
        assert_eq!(parse_tags(" cats, dogs ,,  "), vec!["cats", "dogs"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn serializes_with_document_field_names() {
        let mut rec = record("img-1", "abc");
        rec.p_hash = Some("00ff".to_string());
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["pixvidUrl"], "https://pixvid.test/img-1.png");
        assert_eq!(json["pHash"], "00ff");
        assert_eq!(json["fileTypeSource"], "file-object");
        assert_eq!(json["creationDateSource"], "unknown");
        assert!(json.get("imgbbUrl").is_none());
    }

    #[test]
    fn trash_round_trip_restores_original_id() {
        let rec = record("img-1", "abc");
        let trashed = TrashRecord::from_active(rec.clone(), "trash-1".to_string(), Utc::now());

        assert_eq!(trashed.original_id, "img-1");
        assert_eq!(trashed.into_active(), rec);
    }

    #[test]
    fn trash_record_keeps_both_keys() {
        let trashed = TrashRecord::from_active(record("img-1", "abc"), "trash-1".to_string(), Utc::now());
        let json = serde_json::to_value(&trashed).unwrap();

        assert_eq!(json["id"], "trash-1");
        assert_eq!(json["originalId"], "img-1");
        assert_eq!(json["record"]["sha256"], "abc");

        let back: TrashRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, trashed);
    }

    #[test]
    fn display_url_falls_back_to_pixvid() {
        let mut rec = record("img-1", "abc");
        assert_eq!(rec.display_url(DisplaySource::Imgbb), rec.pixvid_url);

        rec.imgbb_url = Some("https://i.ibb.test/x.png".to_string());
        assert_eq!(rec.display_url(DisplaySource::Imgbb), "https://i.ibb.test/x.png");
        assert_eq!(rec.display_url(DisplaySource::Pixvid), rec.pixvid_url);
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut rec = record("img-1", "abc");
        rec.description = "old".to_string();
        rec.collection_id = Some("col-1".to_string());

        rec.apply(&RecordUpdate {
            tags: Some(vec!["new".to_string()]),
            page_title: Some("  ".to_string()),
            ..RecordUpdate::default()
        });

        assert_eq!(rec.description, "old");
        assert_eq!(rec.tags, vec!["new"]);
        assert_eq!(rec.page_title, None);
        assert_eq!(rec.collection_id.as_deref(), Some("col-1"));

        rec.apply(&RecordUpdate {
            collection_id: Some(None),
            ..RecordUpdate::default()
        });
        assert_eq!(rec.collection_id, None);
    }
}
