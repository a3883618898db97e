use super::{EmbeddingError, EmbeddingProvider, ModelInfo};
use async_trait::async_trait;

/// Deterministic embedding encoder that needs no backend.
///
/// Bytes are folded into vector slots and the result is L2-normalized, so identical texts map
/// to identical vectors. Useful for local development and tests, not for semantic relevance.
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    /// Construct an encoder producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.health_check().await
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.health_check().await?;
        tracing::debug!(
            provider = "hash",
            dimension = self.dimension,
            texts = texts.len(),
            "Generating embeddings"
        );
        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "hash".into(),
            model: "byte-fold".into(),
            base_url: None,
            dimensions: self.dimension,
        }
    }
}
