//! Average Hash (aHash).
//!
//! 1. Shrink the image to hash_size x hash_size luminance cells
//! 2. Compute the mean luminance
//! 3. One bit per cell: brighter than the mean
//!
//! The cheapest fingerprint, and the least robust to edits.

use super::super::fast_resize::downsample_luma;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use super::BitPacker;
use crate::error::HashError;
use image::DynamicImage;

pub struct AverageHasher {
    hash_size: u32,
}

impl AverageHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for AverageHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        let grid = downsample_luma(image, self.hash_size, self.hash_size)?;

        let cells = grid.len() as u64;
        let total: u64 = grid.pixels().map(|p| p[0] as u64).sum();
        let mean = total / cells.max(1);

        let mut packer = BitPacker::with_bits(self.hash_size * self.hash_size);
        for pixel in grid.pixels() {
            packer.push(pixel[0] as u64 > mean);
        }

        Ok(ImageHashValue::new(packer.finish(), self.kind()))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Average
    }
}
