//! File filtering logic for the scanner.

use std::path::Path;

/// MIME type for a known image extension (case-insensitive)
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime)
}

/// Filters files to determine if they are supported images
pub struct ImageFilter {
    /// Whether to include hidden files
    include_hidden: bool,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self {
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Check if a file found while walking should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }
        self.mime_type(path).is_some()
    }

    /// MIME type implied by the path's extension
    pub fn mime_type(&self, path: &Path) -> Option<&'static str> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
