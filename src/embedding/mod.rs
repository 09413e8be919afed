//! # Embedding Providers
//!
//! Turn text into fixed-length vectors for the similarity index.
//!
//! | Provider | Module | Description |
//! |----------|--------|-------------|
//! | `HashEmbedder` | `hashed` | Deterministic, offline; for tests and dry runs |
//! | `OpenAiEmbedder` | `openai` | Semantic embeddings over an OpenAI-compatible API (feature `openai`) |

pub mod hashed;
#[cfg(feature = "openai")]
pub mod openai;

use crate::model::Entity;

pub use hashed::HashEmbedder;
#[cfg(feature = "openai")]
pub use openai::OpenAiEmbedder;

/// Errors raised by an embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Http(String),

    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected {expected}-dimensional embedding, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding service returned no vectors")]
    EmptyResponse,
}

/// Converts text into a vector of fixed dimensionality.
///
/// One provider instance always yields vectors of `dimension()` length.
/// Calls are blocking and carry no timeout or retry of their own.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model, for logs.
    fn model_name(&self) -> &str;

    /// Embed many texts. Default: one `embed` call per text.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embed an entity using [`entity_text`].
    fn embed_entity(&self, entity: &Entity) -> Result<Vec<f32>, EmbedError> {
        self.embed(&entity_text(entity))
    }
}

/// Text used to embed an entity: `"{name}: {description}"`, followed by
/// `" (Also known as: a, b)"` when the entity has aliases.
pub fn entity_text(entity: &Entity) -> String {
    let mut text = format!("{}: {}", entity.name, entity.description);
    if !entity.aliases.is_empty() {
        let aliases: Vec<&str> = entity.aliases.iter().map(String::as_str).collect();
        text.push_str(&format!(" (Also known as: {})", aliases.join(", ")));
    }
    text
}

/// Cosine similarity in `[-1, 1]`. Zero-length or zero-norm inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_text_without_aliases() {
        let e = Entity::new("Google", "Company").with_description("Search company");
        assert_eq!(entity_text(&e), "Google: Search company");
    }

    #[test]
    fn test_entity_text_with_sorted_aliases() {
        let e = Entity::new("Alphabet Inc.", "Company")
            .with_description("Parent of Google")
            .with_aliases(["GOOGL", "Alphabet"]);
        assert_eq!(
            entity_text(&e),
            "Alphabet Inc.: Parent of Google (Also known as: Alphabet, GOOGL)"
        );
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
