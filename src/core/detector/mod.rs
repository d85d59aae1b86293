//! # Detector Module
//!
//! Finds an existing record that holds the same image.
//!
//! ## How It Works
//! 1. Exact match: any record with the same sha256. Authoritative.
//! 2. Near match: Hamming distance between perceptual fingerprints, for
//!    every record that has them. The distance of a candidate is the largest
//!    distance over the configured algorithms, so every algorithm has to
//!    agree before two images count as the same photo.
//!
//! The detector only reports. Whether a match blocks an ingest is the
//! caller's decision.

mod strategy;

pub use strategy::{ComparisonStrategy, MatchType, ThresholdStrategy};

use crate::core::hasher::{ContentFingerprint, HashAlgorithmKind, PerceptualHash, PerceptualHashes};
use crate::core::index::RecordIndex;
use crate::core::record::ImageRecord;
use crate::error::IndexError;
use serde::{Deserialize, Serialize};

/// Why an existing record matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MatchKind {
    /// Byte-identical content
    Exact,
    /// Perceptual fingerprints within the threshold
    Perceptual { distance: u32, match_type: MatchType },
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "identical content"),
            MatchKind::Perceptual {
                distance,
                match_type,
            } => write!(f, "{}, {} bits apart", match_type, distance),
        }
    }
}

/// An existing record the new image duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub record: ImageRecord,
    pub kind: MatchKind,
}

/// Looks up exact and near duplicates
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    strategy: ThresholdStrategy,
    algorithms: Vec<HashAlgorithmKind>,
}

impl DuplicateDetector {
    /// `algorithms` empty means all of them
    pub fn new(strategy: ThresholdStrategy, algorithms: Vec<HashAlgorithmKind>) -> Self {
        let mut algorithms = if algorithms.is_empty() {
            HashAlgorithmKind::ALL.to_vec()
        } else {
            algorithms
        };
        algorithms.sort();
        algorithms.dedup();

        Self {
            strategy,
            algorithms,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.strategy.threshold()
    }

    pub fn algorithms(&self) -> &[HashAlgorithmKind] {
        &self.algorithms
    }

    /// Largest Hamming distance over the configured algorithms
    pub fn distance(&self, a: &PerceptualHashes, b: &PerceptualHashes) -> Option<u32> {
        self.algorithms
            .iter()
            .map(|kind| a.get(*kind).distance(b.get(*kind)))
            .try_fold(0u32, |max, d| d.map(|d| max.max(d)))
    }

    /// Find a duplicate among already-loaded records.
    ///
    /// Exact matches win over any perceptual match. Among perceptual
    /// candidates the smallest distance wins, then the most recently added.
    pub fn find_in(&self, records: &[ImageRecord], fingerprint: &ContentFingerprint) -> Option<DuplicateMatch> {
        let exact = records
            .iter()
            .filter(|r| r.sha256 == fingerprint.sha256)
            .max_by(|a, b| a.internal_added_timestamp.cmp(&b.internal_added_timestamp));

        if let Some(record) = exact {
            return Some(DuplicateMatch {
                record: record.clone(),
                kind: MatchKind::Exact,
            });
        }

        self.nearest(records, fingerprint.perceptual.as_ref()?)
    }

    /// Find a duplicate in the index.
    ///
    /// Reads are unlocked: a record added concurrently may be missed.
    pub async fn find_duplicate(
        &self,
        index: &dyn RecordIndex,
        fingerprint: &ContentFingerprint,
    ) -> Result<Option<DuplicateMatch>, IndexError> {
        let exact = index.find_by_sha256(&fingerprint.sha256).await?;
        if let Some(record) = exact
            .into_iter()
            .max_by(|a, b| a.internal_added_timestamp.cmp(&b.internal_added_timestamp))
        {
            tracing::debug!(id = %record.id, sha256 = %fingerprint.sha256, "exact duplicate found");
            return Ok(Some(DuplicateMatch {
                record,
                kind: MatchKind::Exact,
            }));
        }

        let Some(hashes) = fingerprint.perceptual.as_ref() else {
            return Ok(None);
        };

        let records = index.query_all().await?;
        let found = self.nearest(&records, hashes);
        if let Some(found) = &found {
            tracing::debug!(id = %found.record.id, kind = %found.kind, "near duplicate found");
        }
        Ok(found)
    }

    fn nearest(&self, records: &[ImageRecord], hashes: &PerceptualHashes) -> Option<DuplicateMatch> {
        let mut best: Option<(u32, &ImageRecord)> = None;

        for record in records {
            let Some(existing) = record.perceptual_hashes() else {
                continue;
            };
            let Some(distance) = self.distance(hashes, &existing) else {
                continue;
            };
            if !self.strategy.is_duplicate(distance) {
                continue;
            }

            let closer = match best {
                None => true,
                Some((best_distance, best_record)) => {
                    distance < best_distance
                        || (distance == best_distance
                            && record.internal_added_timestamp > best_record.internal_added_timestamp)
                }
            };
            if closer {
                best = Some((distance, record));
            }
        }

        best.map(|(distance, record)| DuplicateMatch {
            record: record.clone(),
            kind: MatchKind::Perceptual {
                distance,
                match_type: self.strategy.classify(distance),
            },
        })
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(ThresholdStrategy::default(), HashAlgorithmKind::ALL.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::ImageHashValue;
    use crate::core::index::InMemoryIndex;
    use crate::core::record::fixtures::record;
    use chrono::{Duration, Utc};

    fn hashes(bits: u64) -> PerceptualHashes {
        let bytes = bits.to_be_bytes().to_vec();
        PerceptualHashes {
            a_hash: ImageHashValue::new(bytes.clone(), HashAlgorithmKind::Average),
            d_hash: ImageHashValue::new(bytes.clone(), HashAlgorithmKind::Difference),
            p_hash: ImageHashValue::new(bytes, HashAlgorithmKind::Perceptual),
        }
    }

    fn fingerprint(sha256: &str, bits: Option<u64>) -> ContentFingerprint {
        ContentFingerprint {
            sha256: sha256.to_string(),
            perceptual: bits.map(hashes),
        }
    }

    fn stored(id: &str, sha256: &str, bits: u64, age_minutes: i64) -> ImageRecord {
        let mut rec = record(id, sha256);
        rec.set_fingerprint(&fingerprint(sha256, Some(bits)));
        rec.internal_added_timestamp = Utc::now() - Duration::minutes(age_minutes);
        rec
    }

    #[test]
    fn exact_match_beats_closer_perceptual_match() {
        let detector = DuplicateDetector::default();
        let records = vec![
            stored("exact", "same", 0xFFFF_0000_0000_0000, 5),
            stored("near", "other", 0x0000_0000_0000_0001, 1),
        ];

        let found = detector.find_in(&records, &fingerprint("same", Some(0))).unwrap();
        assert_eq!(found.record.id, "exact");
        assert_eq!(found.kind, MatchKind::Exact);
    }

    #[test]
    fn near_match_within_threshold() {
        let detector = DuplicateDetector::default();
        let records = vec![stored("a", "x", 0b111, 1)];

        let found = detector.find_in(&records, &fingerprint("new", Some(0))).unwrap();
        assert_eq!(found.record.id, "a");
        assert!(matches!(found.kind, MatchKind::Perceptual { distance: 3, .. }));
    }

    #[test]
    fn unrelated_image_is_not_a_duplicate() {
        let detector = DuplicateDetector::default();
        let records = vec![stored("a", "x", u64::MAX, 1)];

        assert!(detector.find_in(&records, &fingerprint("new", Some(0))).is_none());
    }

    #[test]
    fn closest_candidate_wins() {
        let detector = DuplicateDetector::default();
        let records = vec![
            stored("far", "1", 0b1111_1111, 0),
            stored("close", "2", 0b1, 10),
        ];

        let found = detector.find_in(&records, &fingerprint("new", Some(0))).unwrap();
        assert_eq!(found.record.id, "close");
    }

    #[test]
    fn distance_tie_goes_to_most_recent() {
        let detector = DuplicateDetector::default();
        let records = vec![
            stored("older", "1", 0b11, 30),
            stored("newer", "2", 0b1100, 2),
        ];

        let found = detector.find_in(&records, &fingerprint("new", Some(0))).unwrap();
        assert_eq!(found.record.id, "newer");
    }

    #[test]
    fn most_recent_exact_match_wins() {
        let detector = DuplicateDetector::default();
        let records = vec![stored("old", "same", 0, 60), stored("new", "same", 0, 1)];

        let found = detector.find_in(&records, &fingerprint("same", None)).unwrap();
        assert_eq!(found.record.id, "new");
    }

    #[test]
    fn undecodable_image_only_matches_exactly() {
        let detector = DuplicateDetector::default();
        let records = vec![stored("a", "x", 0, 1)];

        assert!(detector.find_in(&records, &fingerprint("new", None)).is_none());
    }

    #[test]
    fn records_without_hashes_are_skipped() {
        let detector = DuplicateDetector::default();
        let records = vec![record("plain", "x")];

        assert!(detector.find_in(&records, &fingerprint("new", Some(0))).is_none());
    }

    #[test]
    fn distance_is_the_worst_algorithm() {
        let detector = DuplicateDetector::default();
        let mut b = hashes(0);
        b.p_hash = ImageHashValue::new(0xFFu64.to_be_bytes().to_vec(), HashAlgorithmKind::Perceptual);

        assert_eq!(detector.distance(&hashes(0), &b), Some(8));

        let d_only = DuplicateDetector::new(ThresholdStrategy::default(), vec![HashAlgorithmKind::Difference]);
        assert_eq!(d_only.distance(&hashes(0), &b), Some(0));
    }

    #[tokio::test]
    async fn find_duplicate_reads_the_index() {
        let index = InMemoryIndex::new();
        index.put(&stored("a", "sha-a", 0b1, 5)).await.unwrap();
        let detector = DuplicateDetector::default();

        let exact = detector
            .find_duplicate(&index, &fingerprint("sha-a", None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exact.kind, MatchKind::Exact);

        let near = detector
            .find_duplicate(&index, &fingerprint("sha-b", Some(0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(near.record.id, "a");

        let none = detector
            .find_duplicate(&index, &fingerprint("sha-c", Some(u64::MAX)))
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
