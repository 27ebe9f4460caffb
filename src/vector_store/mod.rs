// Vector store module
// Upserts embedded chunks into a similarity index and retrieves the closest ones for a query

pub mod pinecone;


pub use pinecone::{PineconeClient, PineconeIndex};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::Chunk;
use crate::embeddings::Embedder;
use crate::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
}

/// One entry in the index, keyed by a stable chunk id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vector_count: u64,
}

/// A named similarity index holding text chunks and their vectors
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite `records`, returning how many were written
    fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Up to `top_k` matches for `vector`, best first
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;

    fn stats(&self) -> Result<IndexStats>;

    fn name(&self) -> &str;
}

/// Record id for the chunk at `position` in an ingestion run
#[inline]
pub fn record_id(position: usize) -> String {
    format!("chunk-{}", position)
}

/// Pair chunks with their vectors, numbering ids from `offset`
#[inline]
pub fn build_records(chunks: &[Chunk], vectors: Vec<Vec<f32>>, offset: usize) -> Vec<VectorRecord> {
    chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (chunk, values))| VectorRecord {
            id: record_id(offset + i),
            values,
            metadata: RecordMetadata {
                text: chunk.text.clone(),
            },
        })
        .collect()
}

/// Progress bar for an upsert of `len` chunks, hidden when stderr is not a terminal
#[inline]
pub fn upsert_progress_bar(len: usize) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Indexing chunks {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Embed `chunks` and upsert them into `index` in batches of `batch_size`
///
/// Records are named `chunk-0`, `chunk-1`, ... in chunk order, so re-ingesting
/// overwrites earlier records at the same positions.
#[inline]
pub fn add_chunks(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<usize> {
    if chunks.is_empty() {
        info!("No chunks to add to index '{}'", index.name());
        return Ok(0);
    }
    if batch_size == 0 {
        return Err(RagError::Validation(
            "Upsert batch size must be greater than zero".to_string(),
        ));
    }

    let expected_dimension = embedder.dimension();
    let mut upserted = 0;

    progress.set_length(chunks.len() as u64);
    progress.set_position(0);

    for (batch_number, batch) in chunks.chunks(batch_size).enumerate() {
        let offset = batch_number * batch_size;
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();

        let vectors = embedder.embed_documents(&texts).inspect_err(|e| {
            error!("Failed to embed chunks starting at {}: {}", offset, e);
        })?;

        if vectors.len() != batch.len() {
            return Err(RagError::RemoteUnavailable(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dimension) {
            return Err(RagError::Validation(format!(
                "Embedding has dimension {}, index '{}' expects {}",
                bad.len(),
                index.name(),
                expected_dimension
            )));
        }

        let records = build_records(batch, vectors, offset);
        let written = index.upsert(&records).inspect_err(|e| {
            error!("Failed to upsert chunks starting at {}: {}", offset, e);
        })?;

        if written != records.len() {
            warn!(
                "Index '{}' reported {} upserted records for a batch of {}",
                index.name(),
                written,
                records.len()
            );
        }

        upserted += written;
        progress.inc(batch.len() as u64);
        debug!("Upserted batch {} ({} records)", batch_number + 1, written);
    }

    progress.finish_and_clear();
    info!("Added {} chunks to index '{}'", upserted, index.name());

    Ok(upserted)
}

/// Embed `query` and fetch the `top_k` closest chunks from `index`
#[inline]
pub fn search(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<Vec<QueryMatch>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }

    let vector = embedder.embed_query(query)?;
    let matches = index.query(&vector, top_k)?;
    debug!("Retrieved {} chunks from '{}'", matches.len(), index.name());

    Ok(matches)
}

/// Like [`search`], but a failed embedding or query is logged and yields no matches
#[inline]
pub fn retrieve_chunks(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Vec<QueryMatch> {
    search(index, embedder, query, top_k).unwrap_or_else(|e| {
        error!("Error retrieving chunks: {}", e);
        Vec::new()
    })
}
