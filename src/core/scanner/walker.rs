//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ImageFilter};
use super::{LocalFile, ScanResult};
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    pub fn new(config: ScanConfig) -> Self {
        let filter = ImageFilter::new().with_hidden(config.include_hidden);
        Self { config, filter }
    }

    /// Collect image files from files and directories.
    ///
    /// A path naming a file is taken as-is, whatever its extension.
    /// Directories are walked and filtered by extension. Problems with one
    /// path are recorded and the scan moves on.
    pub fn scan(&self, paths: &[PathBuf]) -> ScanResult {
        let mut result = ScanResult::default();

        for path in paths {
            if path.is_file() {
                match self.local_file(path) {
                    Ok(file) => result.files.push(file),
                    Err(e) => result.errors.push(e),
                }
            } else if path.is_dir() {
                self.scan_directory(path, &mut result);
            } else {
                result.errors.push(ScanError::NotFound { path: path.clone() });
            }
        }

        tracing::debug!(files = result.files.len(), errors = result.errors.len(), "scan complete");
        result
    }

    fn scan_directory(&self, root: &Path, result: &mut ScanResult) {
        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(|entry| include_hidden || entry.depth() == 0 || !is_hidden(entry.path()));

        for entry_result in entries {
            match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_dir() || !self.filter.should_include(path) {
                        continue;
                    }

                    match self.local_file(path) {
                        Ok(file) => result.files.push(file),
                        Err(e) => result.errors.push(e),
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::Read {
                            path,
                            source: std::io::Error::other(e.to_string()),
                        }
                    };

                    tracing::warn!(error = %error, "skipping unreadable entry");
                    result.errors.push(error);
                }
            }
        }
    }

    fn local_file(&self, path: &Path) -> Result<LocalFile, ScanError> {
        let metadata = fs::metadata(path).map_err(|e| ScanError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(LocalFile {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            mime_type: self.filter.mime_type(path),
        })
    }
}
