//! Trait definitions for perceptual hashing.

use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A computed perceptual hash that can be compared
pub trait PerceptualHash: Clone + Send + Sync {
    /// Compute the Hamming distance to another hash
    ///
    /// Returns `None` when the two fingerprints have different widths and
    /// cannot be compared bit for bit.
    fn distance(&self, other: &Self) -> Option<u32>;

    /// Get the raw hash bytes
    fn as_bytes(&self) -> &[u8];

    /// Get the hash as a hexadecimal string
    fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Get the total number of bits in this hash
    fn bit_count(&self) -> u32 {
        (self.as_bytes().len() * 8) as u32
    }
}

/// Available perceptual hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithmKind {
    /// Average Hash (aHash) - threshold against mean luminance
    Average,
    /// Difference Hash (dHash) - sign of horizontal gradients
    Difference,
    /// Perceptual Hash (pHash) - DCT low frequencies against their median
    Perceptual,
}

impl HashAlgorithmKind {
    /// All algorithms, in the order they are stored on a record
    pub const ALL: [HashAlgorithmKind; 3] = [
        HashAlgorithmKind::Average,
        HashAlgorithmKind::Difference,
        HashAlgorithmKind::Perceptual,
    ];
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Average => write!(f, "aHash"),
            HashAlgorithmKind::Difference => write!(f, "dHash"),
            HashAlgorithmKind::Perceptual => write!(f, "pHash"),
        }
    }
}

/// Trait for hash algorithm implementations
pub trait HashAlgorithm: Send + Sync {
    /// Compute a hash from a decoded image
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError>;

    /// Get the algorithm kind
    fn kind(&self) -> HashAlgorithmKind;
}

/// Concrete hash value type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashValue {
    bytes: Vec<u8>,
    algorithm: HashAlgorithmKind,
}

impl ImageHashValue {
    pub fn new(bytes: Vec<u8>, algorithm: HashAlgorithmKind) -> Self {
        Self { bytes, algorithm }
    }

    /// Parse a fingerprint stored on a record as lowercase hex
    pub fn from_hex(hex: &str, algorithm: HashAlgorithmKind) -> Result<Self, HashError> {
        if hex.len() % 2 != 0 {
            return Err(HashError::InvalidEncoding(format!(
                "odd-length {} fingerprint '{}'",
                algorithm, hex
            )));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| {
                        HashError::InvalidEncoding(format!(
                            "non-hex {} fingerprint '{}'",
                            algorithm, hex
                        ))
                    })
            })
            .collect::<Result<Vec<u8>, HashError>>()?;

        Ok(Self { bytes, algorithm })
    }

    pub fn algorithm(&self) -> HashAlgorithmKind {
        self.algorithm
    }
}

impl PerceptualHash for ImageHashValue {
    fn distance(&self, other: &Self) -> Option<u32> {
        if self.algorithm != other.algorithm || self.bytes.len() != other.bytes.len() {
            return None;
        }

        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
