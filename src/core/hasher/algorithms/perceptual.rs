//! Perceptual Hash (pHash).
//!
//! The image is shrunk to a 2*hash_size grid, run through a discrete cosine
//! transform, and the top-left hash_size x hash_size block of low-frequency
//! coefficients is thresholded against its median. Survives rescaling,
//! recompression and mild colour edits.
//!
//! The DCT and median thresholding come from image_hasher.

use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();

        Self { hasher }
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage);
        }

        let hash = self.hasher.hash_image(image);
        Ok(ImageHashValue::new(hash.as_bytes().to_vec(), self.kind()))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Perceptual
    }
}
