//! Block reclamation.

use silt_log::{LogError, Seq, VersionedStore};
use tracing::trace;

/// Issues clears against a store and counts them.
///
/// Clearing is idempotent, so the count is of clears issued, not of blocks
/// that still held data.
pub struct BlockReclaimer<'a, S: ?Sized> {
    store: &'a S,
    issued: u64,
}

impl<'a, S> BlockReclaimer<'a, S>
where
    S: VersionedStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        BlockReclaimer { store, issued: 0 }
    }

    /// Release the storage of the block at `seq`.
    ///
    /// Callers must only pass seqs that are not the live version of their key.
    pub async fn reclaim(&mut self, seq: Seq) -> Result<(), LogError> {
        self.store.clear(seq).await?;
        self.issued += 1;
        trace!(seq, "reclaimed block");
        Ok(())
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}
