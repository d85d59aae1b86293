//! # Metadata Module
//!
//! Derives descriptive fields for a record from the image bytes and,
//! when the image came from a file, what the file told us about itself.
//!
//! ## Precedence
//! - **File type**: the file's declared MIME type, unless the signature in
//!   the bytes names a different format; then the signature. Without a
//!   declared type the signature is used alone, else `unknown`.
//! - **Creation date**: the embedded capture time (DateTimeOriginal, then
//!   DateTimeDigitized), else the file's last-modified time, else `unknown`.
//! - **Dimensions**: from the decode, else from embedded pixel-size tags.
//!
//! Every EXIF field of the primary image is also kept as a raw
//! name-to-value map on the record.
//!
//! EXIF metadata is typically found in JPEG and TIFF files.

use crate::core::hasher::ImageAnalysis;
use crate::core::record::{CreationDateSource, ExifMap, FileTypeSource};
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Reported file type when nothing identifies the bytes
pub const UNKNOWN_FILE_TYPE: &str = "unknown";

/// What the originating file reported about itself.
///
/// Absent entirely for captures that never had a file (e.g. an image
/// fetched from a page).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHints {
    pub declared_mime: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Descriptive fields derived for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub file_type: String,
    pub file_type_source: FileTypeSource,
    pub file_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub creation_date: Option<DateTime<Utc>>,
    pub creation_date_source: CreationDateSource,
    pub exif: ExifMap,
}

impl ExtractedMetadata {
    /// MIME type to send to a host, if known
    pub fn mime_type(&self) -> Option<&str> {
        (self.file_type != UNKNOWN_FILE_TYPE).then_some(self.file_type.as_str())
    }
}

/// Pure transform from bytes and hints to metadata
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn extract(bytes: &[u8], hints: Option<&FileHints>, analysis: &ImageAnalysis) -> ExtractedMetadata {
        let exif = read_exif(bytes);

        let sniffed = analysis.format.map(|format| format.to_mime_type());
        let declared = hints.and_then(|h| h.declared_mime.as_deref());
        let (file_type, file_type_source) = resolve_file_type(declared, sniffed);

        let captured = exif.as_ref().and_then(capture_time);
        let last_modified = hints.and_then(|h| h.last_modified);
        let (creation_date, creation_date_source) = resolve_creation_date(captured, last_modified);

        let (width, height) = match analysis.dimensions {
            Some((w, h)) => (Some(w), Some(h)),
            None => exif.as_ref().map(embedded_dimensions).unwrap_or((None, None)),
        };

        ExtractedMetadata {
            file_type,
            file_type_source,
            file_size: bytes.len() as u64,
            width,
            height,
            creation_date,
            creation_date_source,
            exif: exif.as_ref().map(exif_map).unwrap_or_default(),
        }
    }
}

fn read_exif(bytes: &[u8]) -> Option<Exif> {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::trace!(error = %e, "no readable EXIF");
            None
        }
    }
}

fn resolve_file_type(declared: Option<&str>, sniffed: Option<&str>) -> (String, FileTypeSource) {
    let declared = declared.map(normalize_mime).filter(|m| !m.is_empty());

    match (declared, sniffed) {
        (Some(declared), Some(sniffed)) if declared != sniffed => {
            tracing::debug!(declared = %declared, sniffed, "declared type disagrees with content");
            (sniffed.to_string(), FileTypeSource::Exif)
        }
        (Some(declared), _) => (declared, FileTypeSource::FileObject),
        (None, Some(sniffed)) => (sniffed.to_string(), FileTypeSource::Exif),
        (None, None) => (UNKNOWN_FILE_TYPE.to_string(), FileTypeSource::Unknown),
    }
}

/// Lowercase, drop parameters, and fold common aliases
fn normalize_mime(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => essence,
    }
}

fn resolve_creation_date(
    captured: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
) -> (Option<DateTime<Utc>>, CreationDateSource) {
    match (captured, last_modified) {
        (Some(date), _) => (Some(date), CreationDateSource::Exif),
        (None, Some(date)) => (Some(date), CreationDateSource::FileLastModified),
        (None, None) => (None, CreationDateSource::Unknown),
    }
}

/// Embedded capture time. EXIF carries no zone, so it is read as UTC.
fn capture_time(exif: &Exif) -> Option<DateTime<Utc>> {
    [Tag::DateTimeOriginal, Tag::DateTimeDigitized]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| {
            let text = get_string_value(&field.value)?;
            // EXIF date format: "YYYY:MM:DD HH:MM:SS"
            NaiveDateTime::parse_from_str(&text, "%Y:%m:%d %H:%M:%S")
                .ok()
                .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        })
}

fn embedded_dimensions(exif: &Exif) -> (Option<u32>, Option<u32>) {
    let read = |primary: Tag, fallback: Tag| {
        exif.get_field(primary, In::PRIMARY)
            .or_else(|| exif.get_field(fallback, In::PRIMARY))
            .and_then(|field| get_u32_value(&field.value))
    };

    (
        read(Tag::PixelXDimension, Tag::ImageWidth),
        read(Tag::PixelYDimension, Tag::ImageLength),
    )
}

fn exif_map(exif: &Exif) -> ExifMap {
    exif.fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .map(|field| {
            let value = field.display_value().with_unit(exif).to_string();
            (field.tag.to_string(), value)
        })
        .collect()
}

/// Helper to extract u32 from various EXIF value types
fn get_u32_value(value: &Value) -> Option<u32> {
    match value {
        Value::Long(vec) => vec.first().copied(),
        Value::Short(vec) => vec.first().map(|v| *v as u32),
        _ => None,
    }
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
