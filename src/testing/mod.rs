// In-memory stand-ins for the hosted services, shared by unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, ChatModel};
use crate::vector_store::{IndexStats, QueryMatch, VectorIndex, VectorRecord};
use crate::{RagError, Result};

pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        (0..self.dimension)
            .map(|i| (text.len() + i) as f32 / 100.0)
            .collect()
    }
}

impl Embedder for MockEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::RemoteUnavailable("embedder down".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::RemoteUnavailable("embedder down".to_string()));
        }
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Default)]
pub struct MockIndex {
    pub upserted: Mutex<Vec<VectorRecord>>,
    pub matches: Vec<QueryMatch>,
    pub fail_query: bool,
    pub fail_upsert: bool,
    pub fail_stats: bool,
    /// Stats keep reporting `total_vector_count` and ignore upserted records
    pub stale_stats: bool,
    pub total_vector_count: u64,
    pub queries: AtomicUsize,
}

impl MockIndex {
    pub fn with_matches(texts: &[&str]) -> Self {
        let matches = texts
            .iter()
            .enumerate()
            .map(|(i, text)| QueryMatch {
                id: format!("chunk-{}", i),
                score: 1.0 - i as f32 / 10.0,
                text: (*text).to_string(),
            })
            .collect();
        Self {
            matches,
            total_vector_count: texts.len() as u64,
            ..Self::default()
        }
    }

    pub fn upserted(&self) -> Vec<VectorRecord> {
        self.upserted.lock().expect("lock is not poisoned").clone()
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl VectorIndex for MockIndex {
    fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if self.fail_upsert {
            return Err(RagError::RemoteUnavailable("upsert failed".to_string()));
        }
        self.upserted
            .lock()
            .expect("lock is not poisoned")
            .extend_from_slice(records);
        Ok(records.len())
    }

    fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_query {
            return Err(RagError::RemoteUnavailable("query failed".to_string()));
        }
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    fn stats(&self) -> Result<IndexStats> {
        if self.fail_stats {
            return Err(RagError::RemoteUnavailable("stats failed".to_string()));
        }
        let upserted = if self.stale_stats {
            0
        } else {
            self.upserted.lock().expect("lock is not poisoned").len() as u64
        };
        Ok(IndexStats {
            dimension: 4,
            total_vector_count: self.total_vector_count + upserted,
        })
    }

    fn name(&self) -> &str {
        "mock-index"
    }
}

/// Chat model that replies with a fixed string, or fails when `reply` is `None`
pub struct MockChat {
    pub reply: Option<String>,
    pub transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.transcripts.lock().expect("lock is not poisoned").len()
    }

    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.transcripts.lock().expect("lock is not poisoned").clone()
    }
}

impl ChatModel for MockChat {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.transcripts
            .lock()
            .expect("lock is not poisoned")
            .push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| RagError::RemoteUnavailable("model unavailable".to_string()))
    }
}
