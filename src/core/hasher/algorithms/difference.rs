//! Difference Hash (dHash).
//!
//! 1. Shrink the image to (hash_size + 1) x hash_size luminance cells
//! 2. Compare each cell to its right neighbour
//! 3. One bit per comparison: left is brighter
//!
//! Captures the direction of brightness gradients, so uniform brightness
//! or contrast changes leave it untouched.

use super::super::fast_resize::downsample_luma;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use super::BitPacker;
use crate::error::HashError;
use image::DynamicImage;

pub struct DifferenceHasher {
    hash_size: u32,
}

impl DifferenceHasher {
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        // One extra column so every cell has a right neighbour
        let grid = downsample_luma(image, self.hash_size + 1, self.hash_size)?;

        let mut packer = BitPacker::with_bits(self.hash_size * self.hash_size);
        for y in 0..self.hash_size {
            for x in 0..self.hash_size {
                let left = grid.get_pixel(x, y)[0];
                let right = grid.get_pixel(x + 1, y)[0];
                packer.push(left > right);
            }
        }

        Ok(ImageHashValue::new(packer.finish(), self.kind()))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Difference
    }
}
