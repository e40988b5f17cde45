//! Embedding generation for attraction text.
//!
//! Two providers behind one trait:
//! - `OpenAiEmbedder`: calls the OpenAI embeddings endpoint in bounded
//!   batches; any failed batch aborts the whole generation so callers never
//!   see partial vectors.
//! - `OfflineEmbedder`: deterministic stand-in vectors derived from a hash
//!   of the input text, for single-process testing without network access.

use std::time::Duration;

use serde::Deserialize;

/// Number of texts sent to the provider per request
pub const EMBED_BATCH_SIZE: usize = 50;

/// Request timeout for embedding calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Errors that can occur during embedding generation.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned status {0}: {1}")]
    BadStatus(u16, String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A source of fixed-dimension embedding vectors.
///
/// The same provider services bulk index builds and single-query embedding.
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding dimension every returned vector has.
    fn dimensions(&self) -> usize;

    /// Model name, used to tag persisted artifacts.
    fn model_name(&self) -> &str;

    /// Generate embeddings for a list of texts, in input order.
    ///
    /// Either every text gets a vector or the call fails as a whole.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Generate an embedding for a single text (batch of one).
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".to_string()))
    }

    /// SHA256 hash of the model name for artifact identification.
    fn model_id_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.model_name().as_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dimensions: usize) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            api_key,
            model,
            dimensions,
        }
    }

    /// Send one bounded batch to the provider.
    fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": chunk,
        });

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(EmbeddingError::BadStatus(status.as_u16(), text));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        if parsed.data.len() != chunk.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "sent {} texts, received {} embeddings",
                chunk.len(),
                parsed.data.len()
            )));
        }

        // The API may return items out of order; restore input order
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    got: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }

        Ok(vectors)
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
            // Any chunk failure aborts the whole generation
            let chunk_vectors = self.embed_chunk(chunk).map_err(|e| {
                log::warn!("embedding batch {} failed: {}", i, e);
                e
            })?;
            vectors.extend(chunk_vectors);
        }

        Ok(vectors)
    }
}

/// Deterministic stand-in embedder for offline mode and tests.
///
/// Vectors are derived from a hash of the input text, so the same text
/// always produces the same vector without any network access.
pub struct OfflineEmbedder {
    dimensions: usize,
}

impl OfflineEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn seed_for(text: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    fn splitmix64(state: &mut u64) -> u64 {
        *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = *state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn stub_vector(&self, text: &str) -> Vec<f32> {
        let mut state = Self::seed_for(text);
        (0..self.dimensions)
            .map(|_| {
                let bits = Self::splitmix64(&mut state) >> 40;
                bits as f32 / (1u64 << 24) as f32
            })
            .collect()
    }
}

impl EmbeddingProvider for OfflineEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "offline-stub"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.stub_vector(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_dimensions() {
        let embedder = OfflineEmbedder::new(8);
        let vector = embedder.embed("Louvre museum").unwrap();
        assert_eq!(vector.len(), 8);
    }

    #[test]
    fn test_offline_is_deterministic() {
        let embedder = OfflineEmbedder::new(8);
        let a = embedder.embed("Eiffel Tower").unwrap();
        let b = embedder.embed("Eiffel Tower").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_offline_differs_per_text() {
        let embedder = OfflineEmbedder::new(8);
        let a = embedder.embed("Eiffel Tower").unwrap();
        let b = embedder.embed("Colosseum").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_offline_batch_order() {
        let embedder = OfflineEmbedder::new(4);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = embedder.embed_batch(&texts).unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], embedder.embed("a").unwrap());
        assert_eq!(vectors[2], embedder.embed("c").unwrap());
    }

    #[test]
    fn test_offline_empty_batch() {
        let embedder = OfflineEmbedder::new(4);
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_model_id_hash_differs_by_model() {
        let a = OfflineEmbedder::new(4).model_id_hash();

        let openai = OpenAiEmbedder::new("key".to_string(), "text-embedding-3-small".to_string(), 1536);
        let b = openai.model_id_hash();

        assert_ne!(a, b);
    }
}
