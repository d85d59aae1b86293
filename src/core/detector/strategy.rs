//! Threshold strategies for near-duplicate decisions.

use serde::{Deserialize, Serialize};

/// How close two perceptual fingerprints are, in words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    /// Distance = 0, identical perceptual content
    Exact,
    /// Distance 1-4, virtually identical
    NearExact,
    /// Distance 5-10, likely the same photo re-encoded or resized
    Similar,
    /// Distance 11+, only a duplicate under a permissive threshold
    MaybeSimilar,
}

impl MatchType {
    /// Classify based on Hamming distance
    pub fn from_distance(distance: u32) -> Self {
        match distance {
            0 => MatchType::Exact,
            1..=4 => MatchType::NearExact,
            5..=10 => MatchType::Similar,
            _ => MatchType::MaybeSimilar,
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Exact => write!(f, "Exact Match"),
            MatchType::NearExact => write!(f, "Near-Exact Match"),
            MatchType::Similar => write!(f, "Similar"),
            MatchType::MaybeSimilar => write!(f, "Possibly Similar"),
        }
    }
}

/// Decides whether a Hamming distance makes two images the same photo
pub trait ComparisonStrategy: Send + Sync {
    fn is_duplicate(&self, distance: u32) -> bool;

    fn classify(&self, distance: u32) -> MatchType {
        MatchType::from_distance(distance)
    }

    fn threshold(&self) -> u32;
}

/// Distance at or under a fixed number of differing bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdStrategy {
    threshold: u32,
}

impl ThresholdStrategy {
    /// Recommended thresholds for 64-bit fingerprints:
    /// - 5: Conservative, few false positives
    /// - 8: Balanced
    /// - 10: Permissive, catches more re-encodes (default)
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn permissive() -> Self {
        Self::new(10)
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl ComparisonStrategy for ThresholdStrategy {
    fn is_duplicate(&self, distance: u32) -> bool {
        distance <= self.threshold
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }
}
