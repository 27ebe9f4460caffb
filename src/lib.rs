use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`RagError`] that callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    RemoteUnavailable,
    NotFound,
}

impl RagError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RemoteUnavailable(_) | Self::Io(_) | Self::Other(_) => {
                ErrorKind::RemoteUnavailable
            }
        }
    }
}

pub mod agent;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod shell;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;
