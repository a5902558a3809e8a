//! Error types for log operations.

use crate::entry::Seq;
use thiserror::Error;

/// Errors surfaced by a [`VersionedStore`](crate::VersionedStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Block {0} is not available locally")]
    Unavailable(Seq),

    #[error("Index is not available locally")]
    IndexUnavailable,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Sequence number overflow: {0} exceeds 48 bits")]
    SeqOverflow(Seq),
}

impl LogError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LogError::Unavailable(_) | LogError::IndexUnavailable | LogError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
