//! Embedding contract and a deterministic hash-based embedder.

use crate::errors::StepError;

/// Maps text to a fixed-length vector.
pub trait Embedder: Send + Sync {
    /// Output vector length; every `embed` result has exactly this length.
    fn dims(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, StepError>;
}

/// Deterministic embedder folding bytes into buckets, L2-normalized.
///
/// No semantic meaning; identical inputs give identical vectors, which is
/// all similarity tests and offline demos need.
#[derive(Clone, Copy, Debug)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    /// `dims` is clamped to at least 1.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Embedder for HashEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, StepError> {
        let mut buckets = vec![0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            buckets[(i + usize::from(byte)) % self.dims] += f32::from(byte) / 255.0;
        }
        let norm = buckets.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut buckets {
                *x /= norm;
            }
        }
        Ok(buckets)
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero norm or the
/// lengths differ.
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
