//! # Scanner Module
//!
//! Collects image files from disk for ingest. Each file carries what a
//! browser `File` would report: a MIME type (guessed from the extension)
//! and the OS last-modified time.
//!
//! ## Supported Extensions
//! - JPEG (.jpg, .jpeg)
//! - PNG (.png)
//! - WebP (.webp)
//! - GIF (.gif)
//! - BMP (.bmp)
//! - TIFF (.tiff, .tif)
//! - HEIC (.heic, .heif) - stored by exact hash only; not decoded
//!
//! ## Example
//! ```rust,ignore
//! use imgvault::core::scanner::{ScanConfig, WalkDirScanner};
//!
//! let result = WalkDirScanner::new(ScanConfig::default()).scan(&["/Users/me/Pictures".into()]);
//! for file in result.files {
//!     let request = file.read(fields.clone())?;
//! }
//! ```

mod filter;
mod walker;

pub use filter::{mime_for_extension, ImageFilter};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::core::metadata::FileHints;
use crate::core::replication::{FormFields, IngestRequest};
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// An image file found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// MIME type implied by the extension
    pub mime_type: Option<&'static str>,
}

impl LocalFile {
    /// Base file name, as a browser would report it
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Read the file into an ingest request.
    ///
    /// `fields.file_name` is filled from the path when not already set.
    pub fn read(&self, mut fields: FormFields) -> Result<IngestRequest, ScanError> {
        let bytes = std::fs::read(&self.path).map_err(|e| ScanError::Read {
            path: self.path.clone(),
            source: e,
        })?;

        if fields.file_name.is_none() {
            fields.file_name = self.file_name();
        }

        let hints = FileHints {
            declared_mime: self.mime_type.map(str::to_string),
            last_modified: self.modified,
        };

        Ok(IngestRequest::new(bytes, fields, Some(hints)))
    }
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files to ingest, in walk order
    pub files: Vec<LocalFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}
