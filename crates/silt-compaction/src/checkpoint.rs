//! Persisted sweep progress.
//!
//! A checkpoint records the scan window of one compaction channel and is
//! stored as user data on the log it describes, so it persists and
//! replicates together with that log.
//!
//! Layout: 12 bytes, `last_cleared` then `next_clearing`, each a 6-byte
//! big-endian unsigned integer. Two older layouts are still read: a single
//! 6-byte seq, and the JSON text `[next,ceiling]`. Both resume at their first
//! value.

use crate::error::{CompactionError, Result};
use serde::{Deserialize, Serialize};
use silt_log::codec::{self, CodecError, U48_LEN};
use silt_log::{Seq, SeqRange, VersionedStore};
use std::fmt;
use tracing::debug;

/// Encoded size of a checkpoint.
pub const CHECKPOINT_LEN: usize = 2 * U48_LEN;

/// Scan window of a compaction channel, `[last_cleared, next_clearing)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_cleared: Seq,
    pub next_clearing: Seq,
}

impl Checkpoint {
    pub fn new(last_cleared: Seq, next_clearing: Seq) -> Self {
        Checkpoint {
            last_cleared,
            next_clearing,
        }
    }

    /// Checkpoint whose floor and ceiling are both `boundary`.
    pub fn at(boundary: Seq) -> Self {
        Self::new(boundary, boundary)
    }

    pub fn window(&self) -> SeqRange {
        SeqRange::new(self.last_cleared, self.next_clearing)
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(CHECKPOINT_LEN);
        codec::put_u48(&mut out, self.last_cleared)?;
        codec::put_u48(&mut out, self.next_clearing)?;
        Ok(out)
    }

    /// Decode any supported layout. The error is a human-readable reason.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        let is_json = bytes.first() == Some(&b'[') && bytes.last() == Some(&b']');
        let checkpoint = match bytes.len() {
            _ if is_json => {
                // `[next, ceiling]`: the window below `ceiling` was never cleared
                let [next, ceiling]: [Seq; 2] =
                    serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
                if next > ceiling {
                    return Err(format!("json window [{}, {}] is inverted", next, ceiling));
                }
                Checkpoint::at(next)
            }
            CHECKPOINT_LEN => Checkpoint::new(
                codec::decode_u48(&bytes[..U48_LEN]).map_err(|e| e.to_string())?,
                codec::decode_u48(&bytes[U48_LEN..]).map_err(|e| e.to_string())?,
            ),
            U48_LEN => Checkpoint::at(codec::decode_u48(bytes).map_err(|e| e.to_string())?),
            n => return Err(format!("unrecognized checkpoint layout of {} bytes", n)),
        };

        if checkpoint.last_cleared > checkpoint.next_clearing {
            return Err(format!(
                "last_cleared {} is past next_clearing {}",
                checkpoint.last_cleared, checkpoint.next_clearing
            ));
        }
        Ok(checkpoint)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.window())
    }
}

/// Reject ids that cannot name a channel.
pub(crate) fn validate_channel_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CompactionError::MissingChannelId);
    }
    Ok(())
}

/// Loads and saves checkpoints as user data on a store.
pub struct CheckpointStore<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> CheckpointStore<'a, S>
where
    S: VersionedStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        CheckpointStore { store }
    }

    /// Load the checkpoint for a channel, `{0, 0}` if none was saved.
    pub async fn load(&self, id: &str) -> Result<Checkpoint> {
        validate_channel_id(id)?;

        let Some(bytes) = self.store.get_user_data(id).await? else {
            debug!(channel = id, "no checkpoint stored, starting from zero");
            return Ok(Checkpoint::default());
        };

        let checkpoint =
            Checkpoint::decode(&bytes).map_err(|reason| CompactionError::CorruptCheckpoint {
                channel: id.to_string(),
                reason,
            })?;

        let length = self.store.length();
        if checkpoint.next_clearing > length {
            return Err(CompactionError::CheckpointOutOfRange {
                channel: id.to_string(),
                next_clearing: checkpoint.next_clearing,
                length,
            });
        }

        debug!(channel = id, %checkpoint, "checkpoint loaded");
        Ok(checkpoint)
    }

    pub async fn save(&self, id: &str, checkpoint: Checkpoint) -> Result<()> {
        validate_channel_id(id)?;
        let bytes = checkpoint.encode()?;
        self.store.set_user_data(id, &bytes).await?;
        debug!(channel = id, %checkpoint, "checkpoint saved");
        Ok(())
    }
}
