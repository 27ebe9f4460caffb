// Embeddings module
// Converts chunk and query text into fixed-dimension vectors

pub mod openai;

pub use openai::OpenAiEmbeddings;

use crate::Result;

/// Produces embedding vectors for documents and queries
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;
}
