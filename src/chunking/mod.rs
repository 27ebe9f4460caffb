
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, error, warn};

/// Literal separator used by [`SplitStrategy::Separator`]
pub const SENTENCE_SEPARATOR: &str = ". ";

static SENTENCE_BOUNDARY: LazyLock<Result<Regex, fancy_regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+"));

/// A bounded-length piece of a source document, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Ordinal of this chunk within one ingestion run
    pub id: usize,
    pub text: String,
    /// File the text was extracted from
    pub source: PathBuf,
}

/// How raw text is cut into sentences before greedy accumulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Split on the literal `". "` separator and rejoin with it
    #[default]
    Separator,
    /// Split after `.`, `!` or `?` followed by whitespace and rejoin with a space
    Sentence,
}

impl SplitStrategy {
    fn joiner(self) -> &'static str {
        match self {
            Self::Separator => SENTENCE_SEPARATOR,
            Self::Sentence => " ",
        }
    }
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub max_length: usize,
    /// Characters of the previous sentence repeated at the start of the next chunk
    pub chunk_overlap: usize,
    pub strategy: SplitStrategy,
    /// Whether directory scans descend into subdirectories
    pub recursive: bool,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_length: 1000,
            chunk_overlap: 100,
            strategy: SplitStrategy::Separator,
            recursive: false,
        }
    }
}

/// Chunk text using the sizes and strategy from `config`
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Vec<String> {
    chunk_text(text, config.max_length, config.chunk_overlap, config.strategy)
}

/// Split `text` into ordered chunks of at most `max_length` characters.
///
/// Sentences are accumulated greedily. When a chunk is full, the next one starts with the
/// last `chunk_overlap` characters of the previous sentence if they still fit. A sentence
/// longer than `max_length` is cut into consecutive `max_length` windows.
#[inline]
pub fn chunk_text(
    text: &str,
    max_length: usize,
    chunk_overlap: usize,
    strategy: SplitStrategy,
) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    if max_length == 0 {
        error!("Cannot chunk text with max_length 0");
        return Vec::new();
    }

    let mut chunk_overlap = chunk_overlap;
    if chunk_overlap >= max_length {
        warn!(
            "chunk_overlap ({}) >= max_length ({}). Adjusting chunk_overlap to {}.",
            chunk_overlap,
            max_length,
            max_length - 1
        );
        chunk_overlap = max_length - 1;
    }

    let joiner = strategy.joiner();
    let joiner_len = joiner.chars().count();

    let mut sentences = split_sentences(text, strategy);
    if sentences.is_empty() {
        sentences.push(text.trim());
    }

    let pieces = sentences
        .into_iter()
        .flat_map(|sentence| fit_to_length(sentence, max_length))
        .collect::<Vec<_>>();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut previous: Option<&str> = None;

    for piece in &pieces {
        let piece_len = piece.chars().count();

        if current_len == 0 {
            current.push_str(piece);
            current_len = piece_len;
        } else if current_len + joiner_len + piece_len <= max_length {
            current.push_str(joiner);
            current.push_str(piece);
            current_len += joiner_len + piece_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;

            if chunk_overlap > 0 && chunk_overlap + joiner_len + piece_len <= max_length {
                if let Some(prev) = previous {
                    let tail = char_tail(prev, chunk_overlap);
                    let tail = tail.trim();
                    if !tail.is_empty() {
                        current.push_str(tail);
                        current.push_str(joiner);
                        current_len = tail.chars().count() + joiner_len;
                    }
                }
            }

            current.push_str(piece);
            current_len += piece_len;
        }

        previous = Some(piece.as_str());
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    debug!("Chunked text into {} chunks", chunks.len());
    chunks
}

fn split_sentences(text: &str, strategy: SplitStrategy) -> Vec<&str> {
    let raw = match strategy {
        SplitStrategy::Separator => text.split(SENTENCE_SEPARATOR).collect::<Vec<_>>(),
        SplitStrategy::Sentence => split_on_boundaries(text),
    };

    raw.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_on_boundaries(text: &str) -> Vec<&str> {
    let regex = match &*SENTENCE_BOUNDARY {
        Ok(regex) => regex,
        Err(e) => {
            error!("Sentence boundary pattern failed to compile: {}", e);
            return vec![text];
        }
    };

    let mut sentences = Vec::new();
    let mut start = 0;
    for found in regex.find_iter(text) {
        let found = match found {
            Ok(found) => found,
            Err(e) => {
                warn!("Sentence boundary detection stopped early: {}", e);
                break;
            }
        };
        if let Some(sentence) = text.get(start..found.start()) {
            sentences.push(sentence);
        }
        start = found.end();
    }
    if let Some(rest) = text.get(start..) {
        sentences.push(rest);
    }

    sentences
}

/// Cut a sentence into windows of at most `max_length` characters
fn fit_to_length(sentence: &str, max_length: usize) -> Vec<String> {
    if sentence.chars().count() <= max_length {
        return vec![sentence.to_string()];
    }

    debug!(
        "Sentence of {} characters exceeds max_length {}, splitting",
        sentence.chars().count(),
        max_length
    );

    sentence
        .chars()
        .collect::<Vec<_>>()
        .chunks(max_length)
        .map(|window| window.iter().collect::<String>().trim().to_string())
        .filter(|window| !window.is_empty())
        .collect()
}

fn char_tail(text: &str, count: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}
