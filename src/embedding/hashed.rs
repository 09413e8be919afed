//! Deterministic offline embeddings.
//!
//! The vector is a pure function of the input text: a SHA-256 digest of the
//! text seeds a ChaCha generator, which draws uniform components in
//! `[-1, 1)`; the result is normalized to unit length. There is no semantic
//! signal. Identical texts map to identical vectors, anything else lands
//! roughly orthogonal.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use super::{EmbedError, EmbeddingProvider};

/// Dimension of the default sentence-embedding model the pipeline targets.
pub const DEFAULT_DIMENSION: usize = 384;

/// Content-hash embedding provider.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dimension: DEFAULT_DIMENSION }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = ChaCha8Rng::from_seed(seed);

        let mut v: Vec<f32> = (0..self.dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-sha256-chacha8"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_same_text_same_vector() {
        let e = HashEmbedder::new();
        let a = e.embed("Apple: consumer electronics").unwrap();
        let b = e.embed("Apple: consumer electronics").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_unit_length() {
        let v = HashEmbedder::with_dimension(64).embed("Foxconn").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn test_different_text_is_far() {
        let e = HashEmbedder::new();
        let a = e.embed("Apple").unwrap();
        let b = e.embed("Tesla").unwrap();
        assert!(cosine_similarity(&a, &b) < 0.5);
    }

    #[test]
    fn test_zero_dimension_is_clamped() {
        assert_eq!(HashEmbedder::with_dimension(0).dimension(), 1);
    }
}
