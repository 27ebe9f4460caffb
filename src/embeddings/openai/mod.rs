#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::Embedder;
use crate::config::Config;
use crate::http::{HttpClient, join_endpoint};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    base_url: Url,
    api_key: String,
    model: String,
    dimension: u32,
    batch_size: u32,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbeddings {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.openai.api_key.clone().ok_or_else(|| {
            RagError::Config(
                "OpenAI API key is not set (openai.api_key or OPENAI_API_KEY)".to_string(),
            )
        })?;

        let base_url = config
            .openai_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        info!(
            "OpenAI embeddings initialized with model {}",
            config.openai.embedding_model
        );

        Ok(Self {
            base_url,
            api_key,
            model: config.openai.embedding_model.clone(),
            dimension: config.openai.embedding_dimension,
            batch_size: config.openai.batch_size,
            http: HttpClient::new(Duration::from_secs(config.openai.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Only the text-embedding-3 family accepts a requested output size
    fn requested_dimensions(&self) -> Option<u32> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimension)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = join_endpoint(&self.base_url, "embeddings")?;
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.requested_dimensions(),
        };
        let auth = format!("Bearer {}", self.api_key);

        let response: EmbeddingResponse =
            self.http
                .post_json(&url, &[("Authorization", auth.as_str())], &request)?;

        if response.data.len() != texts.len() {
            return Err(RagError::RemoteUnavailable(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if let Some((position, d)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
            return Err(RagError::RemoteUnavailable(format!(
                "Embedding response has index {} at position {}; expected indexes 0..{}",
                d.index,
                position,
                texts.len()
            )));
        }

        let expected = self.dimension as usize;
        data.into_iter()
            .map(|d| {
                if d.embedding.len() == expected {
                    Ok(d.embedding)
                } else {
                    Err(RagError::Validation(format!(
                        "Embedding model {} returned {} dimensions, expected {}",
                        self.model,
                        d.embedding.len(),
                        expected
                    )))
                }
            })
            .collect()
    }
}

impl Embedder for OpenAiEmbeddings {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1) as usize) {
            vectors.extend(self.embed_batch(batch)?);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating query embedding (length: {})", text.len());

        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::RemoteUnavailable("Empty embedding response".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension as usize
    }
}
