// Ingestion pipeline: directory scan, extraction and chunking
// Embedding and upserting the resulting chunks lives in vector_store::add_chunks

#[cfg(test)]
mod tests;

use std::path::Path;
use tracing::{debug, info};

use crate::chunking::{Chunk, ChunkingConfig, chunk_with_config};
use crate::extract::{extract_text, scan_directory};
use crate::{RagError, Result};

/// Read and chunk every supported document in `directory`.
///
/// Chunk ids are ordinals across the whole run, in path order. Files that cannot be read
/// contribute no chunks.
#[inline]
pub fn process_files(directory: &Path, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if !directory.is_dir() {
        return Err(RagError::NotFound(format!(
            "Directory does not exist: {}",
            directory.display()
        )));
    }

    let files = scan_directory(directory, config.recursive)?;
    debug!(
        "Found {} supported files in {}",
        files.len(),
        directory.display()
    );

    let mut all_chunks = Vec::new();
    for path in files {
        let text = extract_text(&path);
        if text.trim().is_empty() {
            debug!("No text extracted from {}", path.display());
            continue;
        }

        for text in chunk_with_config(&text, config) {
            all_chunks.push(Chunk {
                id: all_chunks.len(),
                text,
                source: path.clone(),
            });
        }
    }

    info!(
        "Processed {} chunks from directory '{}'.",
        all_chunks.len(),
        directory.display()
    );
    Ok(all_chunks)
}
