//! Embedding providers.
//!
//! The actual encoder is an external collaborator (CLIP-style joint
//! image/text space); the runtime only depends on this trait. When a
//! provider fails, ingestion substitutes a random unit vector so the
//! pipeline keeps running, at the cost of retrieval quality for that
//! frame.

use crate::error::{MemoryError, MemoryResult};
use async_trait::async_trait;
use rand::Rng;
use waymark_world::Frame;

/// A model that maps images and text into one embedding space.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    async fn embed_image(&self, frame: &Frame) -> MemoryResult<Vec<f32>>;

    async fn embed_text(&self, text: &str) -> MemoryResult<Vec<f32>>;
}

/// A random unit vector, the liveness fallback for failed embeddings.
pub fn random_unit_embedding(dimensions: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut v: Vec<f32> = (0..dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let norm: f32 = v.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for c in &mut v {
            *c /= norm;
        }
    } else if let Some(first) = v.first_mut() {
        *first = 1.0;
    }
    v
}

/// Stand-in provider used when no encoder is wired up: every embedding
/// is random, which keeps the pipeline alive but makes retrieval
/// meaningless.
pub struct RandomEmbedding {
    dimensions: usize,
}

impl RandomEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for RandomEmbedding {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_image(&self, _frame: &Frame) -> MemoryResult<Vec<f32>> {
        Ok(random_unit_embedding(self.dimensions))
    }

    async fn embed_text(&self, _text: &str) -> MemoryResult<Vec<f32>> {
        Ok(random_unit_embedding(self.dimensions))
    }
}

/// Provider that always fails; exercises the fallback path in tests.
pub struct FailingEmbedding {
    dimensions: usize,
}

impl FailingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedding {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_image(&self, _frame: &Frame) -> MemoryResult<Vec<f32>> {
        Err(MemoryError::EmbeddingUnavailable("model not loaded".into()))
    }

    async fn embed_text(&self, _text: &str) -> MemoryResult<Vec<f32>> {
        Err(MemoryError::EmbeddingUnavailable("model not loaded".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_embedding_is_unit_length() {
        let v = random_unit_embedding(512);
        assert_eq!(v.len(), 512);
        let norm: f32 = v.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn failing_provider_reports_unavailable() {
        let provider = FailingEmbedding::new(8);
        let frame = Frame::new(1, 1, vec![0, 0, 0], 0.0).unwrap();
        assert!(matches!(
            provider.embed_image(&frame).await,
            Err(MemoryError::EmbeddingUnavailable(_))
        ));
    }
}
