//! # Hasher Module
//!
//! Derives the content fingerprint of an image from its raw bytes.
//!
//! ## Fingerprints
//! - **sha256** - cryptographic digest of the raw bytes, for exact duplicates
//! - **aHash (Average Hash)** - 8x8 grid thresholded against mean luminance
//! - **dHash (Difference Hash)** - 9x8 grid, sign of each horizontal step
//! - **pHash (Perceptual Hash)** - DCT low frequencies against their median
//!
//! The three perceptual fingerprints are 64 bits wide and compared by
//! Hamming distance. When the bytes cannot be decoded, only the sha256 is
//! produced and deduplication falls back to exact matches.
//!
//! ## Example
//! ```rust,ignore
//! use imgvault::core::hasher::HashComputer;
//!
//! let analysis = HashComputer::new().analyze(&bytes);
//! println!("{}", analysis.fingerprint.sha256);
//! ```

mod algorithms;
pub mod fast_decode;
pub mod fast_resize;
mod traits;

pub use algorithms::{AverageHasher, DifferenceHasher, PerceptualHasher};
pub use traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue, PerceptualHash};

use crate::error::HashError;
use fast_decode::{probe_dimensions, sniff_format, FastDecoder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Grid size used for every perceptual fingerprint (8x8 = 64 bits)
pub const HASH_SIZE: u32 = 8;

/// Compute the SHA-256 hex digest of raw bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The three perceptual fingerprints of one decoded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHashes {
    pub a_hash: ImageHashValue,
    pub d_hash: ImageHashValue,
    pub p_hash: ImageHashValue,
}

impl PerceptualHashes {
    /// Look up the fingerprint produced by one algorithm
    pub fn get(&self, kind: HashAlgorithmKind) -> &ImageHashValue {
        match kind {
            HashAlgorithmKind::Average => &self.a_hash,
            HashAlgorithmKind::Difference => &self.d_hash,
            HashAlgorithmKind::Perceptual => &self.p_hash,
        }
    }

    /// Rebuild from the hex strings stored on a record.
    ///
    /// Returns `None` unless all three are present and well formed.
    pub fn from_hex(a_hash: Option<&str>, d_hash: Option<&str>, p_hash: Option<&str>) -> Option<Self> {
        Some(Self {
            a_hash: ImageHashValue::from_hex(a_hash?, HashAlgorithmKind::Average).ok()?,
            d_hash: ImageHashValue::from_hex(d_hash?, HashAlgorithmKind::Difference).ok()?,
            p_hash: ImageHashValue::from_hex(p_hash?, HashAlgorithmKind::Perceptual).ok()?,
        })
    }
}

/// Exact + perceptual fingerprint of an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFingerprint {
    /// Lowercase hex SHA-256 of the raw bytes
    pub sha256: String,
    /// Absent when the bytes could not be decoded into pixels
    pub perceptual: Option<PerceptualHashes>,
}

/// Everything learned from the bytes while fingerprinting them
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub fingerprint: ContentFingerprint,
    /// Pixel dimensions, from the decode or from the header alone
    pub dimensions: Option<(u32, u32)>,
    /// Container format sniffed from the magic bytes
    pub format: Option<image::ImageFormat>,
    /// Why the pixels could not be decoded, when they could not
    pub decode_error: Option<String>,
}

/// Computes content fingerprints. Stateless, so one instance can be shared
/// across threads and calls without affecting results.
pub struct HashComputer {
    average: AverageHasher,
    difference: DifferenceHasher,
    perceptual: PerceptualHasher,
}

impl HashComputer {
    pub fn new() -> Self {
        Self {
            average: AverageHasher::new(HASH_SIZE),
            difference: DifferenceHasher::new(HASH_SIZE),
            perceptual: PerceptualHasher::new(HASH_SIZE),
        }
    }

    /// Fingerprint raw bytes.
    ///
    /// Decode failures are not errors here: they leave `perceptual` empty
    /// and are reported through `decode_error`.
    pub fn analyze(&self, bytes: &[u8]) -> ImageAnalysis {
        let sha256 = sha256_hex(bytes);
        let format = sniff_format(bytes);

        let (perceptual, dimensions, decode_error) = match self.perceptual_hashes(bytes) {
            Ok((hashes, dimensions)) => (Some(hashes), Some(dimensions), None),
            Err(e) => {
                tracing::debug!(sha256 = %sha256, error = %e, "perceptual hashing skipped");
                (None, probe_dimensions(bytes), Some(e.to_string()))
            }
        };

        ImageAnalysis {
            fingerprint: ContentFingerprint { sha256, perceptual },
            dimensions,
            format,
            decode_error,
        }
    }

    /// Fingerprint raw bytes, returning only the hashes
    pub fn fingerprint(&self, bytes: &[u8]) -> ContentFingerprint {
        self.analyze(bytes).fingerprint
    }

    fn perceptual_hashes(&self, bytes: &[u8]) -> Result<(PerceptualHashes, (u32, u32)), HashError> {
        let image = FastDecoder::decode(bytes)?;
        let dimensions = (image.width(), image.height());

        let hashes = PerceptualHashes {
            a_hash: self.average.hash_image(&image)?,
            d_hash: self.difference.hash_image(&image)?,
            p_hash: self.perceptual.hash_image(&image)?,
        };

        Ok((hashes, dimensions))
    }
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::io::Cursor;
    use std::sync::Arc;

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 120]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn decodable_image_gets_every_fingerprint() {
        let analysis = HashComputer::new().analyze(&png_bytes());

        let hashes = analysis.fingerprint.perceptual.expect("perceptual hashes");
        assert_eq!(hashes.a_hash.to_hex().len(), 16);
        assert_eq!(hashes.d_hash.to_hex().len(), 16);
        assert_eq!(hashes.p_hash.to_hex().len(), 16);
        for kind in HashAlgorithmKind::ALL {
            assert_eq!(hashes.get(kind).algorithm(), kind);
        }
        assert_eq!(analysis.dimensions, Some((64, 48)));
        assert_eq!(analysis.format, Some(image::ImageFormat::Png));
        assert!(analysis.decode_error.is_none());
    }

    #[test]
    fn undecodable_bytes_keep_exact_hash_only() {
        let bytes = b"this is not a valid image file";
        let analysis = HashComputer::new().analyze(bytes);

        assert_eq!(analysis.fingerprint.sha256, sha256_hex(bytes));
        assert!(analysis.fingerprint.perceptual.is_none());
        assert!(analysis.dimensions.is_none());
        assert!(analysis.decode_error.is_some());
    }

    #[test]
    fn hashes_round_trip_through_hex() {
        let fingerprint = HashComputer::new().fingerprint(&png_bytes());
        let hashes = fingerprint.perceptual.unwrap();

        let restored = PerceptualHashes::from_hex(
            Some(&hashes.a_hash.to_hex()),
            Some(&hashes.d_hash.to_hex()),
            Some(&hashes.p_hash.to_hex()),
        );
        assert_eq!(restored, Some(hashes));
        assert_eq!(PerceptualHashes::from_hex(None, Some("00"), Some("00")), None);
    }

    #[test]
    fn fingerprint_is_deterministic_across_threads() {
        let computer = Arc::new(HashComputer::new());
        let bytes = Arc::new(png_bytes());
        let expected = computer.fingerprint(&bytes);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let computer = Arc::clone(&computer);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || computer.fingerprint(&bytes))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
