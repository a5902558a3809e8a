//! Error types for compaction.

use silt_log::{CodecError, LogError, Seq};
use thiserror::Error;

/// Errors that can occur during compaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompactionError {
    #[error("Compaction channel id must not be empty")]
    MissingChannelId,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt checkpoint for channel {channel}: {reason}")]
    CorruptCheckpoint { channel: String, reason: String },

    #[error("Checkpoint for channel {channel} reaches {next_clearing}, past log length {length}")]
    CheckpointOutOfRange {
        channel: String,
        next_clearing: Seq,
        length: Seq,
    },

    #[error("Compaction channel {0} is already sweeping")]
    ChannelBusy(String),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CompactionError {
    /// Whether the failed operation can simply be run again later.
    ///
    /// A failed sweep never persists its checkpoint, so retrying resumes from
    /// the last completed window.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompactionError::Log(e) => e.is_transient(),
            CompactionError::ChannelBusy(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CompactionError {
    fn from(err: serde_json::Error) -> Self {
        CompactionError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompactionError>;
