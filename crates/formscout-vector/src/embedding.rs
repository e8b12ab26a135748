//! Embedding generation.

use serde::{Deserialize, Serialize};

/// Error type for embedding operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding failed: {0}")]
    Failed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Embedding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Vector representation.
    pub vector: Vec<f32>,
    /// Dimension of the embedding.
    pub dimension: usize,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        let dimension = vector.len();
        Self { vector, dimension }
    }

    pub fn zeros(dimension: usize) -> Self {
        Self::new(vec![0.0; dimension])
    }

    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    /// Compute cosine similarity with another embedding.
    ///
    /// Zero vectors and mismatched dimensions yield 0.0.
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.dimension != other.dimension {
            return 0.0;
        }

        let dot: f32 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| a * b)
            .sum();

        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }
}

/// Turns text into a fixed-length vector.
pub trait EmbeddingCodec: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    fn dimension(&self) -> usize;
}

/// Split on non-word characters, lowercase, and drop tokens of two
/// characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// 32-bit polynomial rolling hash.
fn rolling_hash(token: &str) -> u32 {
    token
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
}

/// Hashed bag-of-words embedding.
///
/// Each token adds a fixed increment to the dimension its rolling hash maps
/// to; the accumulator is then L2-normalized. Texts without usable tokens
/// produce the zero vector.
pub struct HashEmbeddingCodec {
    dimension: usize,
    max_input_bytes: usize,
}

impl HashEmbeddingCodec {
    pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_input_bytes: Self::DEFAULT_MAX_INPUT_BYTES,
        }
    }

    /// Reject inputs larger than `bytes`.
    pub fn with_max_input_bytes(mut self, bytes: usize) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    fn accumulate(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let idx = rolling_hash(&token) as usize % self.dimension;
            vector[idx] += 1.0;
        }
        vector
    }
}

impl Default for HashEmbeddingCodec {
    fn default() -> Self {
        Self::new(128)
    }
}

impl EmbeddingCodec for HashEmbeddingCodec {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.len() > self.max_input_bytes {
            return Err(EmbeddingError::InvalidInput(format!(
                "text of {} bytes exceeds limit of {}",
                text.len(),
                self.max_input_bytes
            )));
        }

        let mut vector = self.accumulate(text);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(Embedding::new(vector))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
#[path = "embedding_tests.rs"]
mod tests;
