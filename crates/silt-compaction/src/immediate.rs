//! Writes that reclaim the block they supersede.
//!
//! `put_and_clear` and `del_and_clear` perform one mutation and, when it took
//! effect, immediately clear the entry that was live for the key before it.
//! They are safe to mix with sweeps: a sweep that later reaches the cleared
//! block simply finds nothing left to do.

use crate::error::Result;
use crate::reclaimer::BlockReclaimer;
use silt_log::{Entry, GetOptions, Seq, VersionedStore, WriteOptions};
use tracing::debug;

/// What an immediate write did with the previously live block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmediateOutcome {
    /// The mutation applied and the previous block at this seq was cleared.
    Reclaimed(Seq),
    /// The key had no live entry before the write.
    NothingToReclaim,
    /// The CAS predicate rejected the mutation; nothing changed.
    CasRejected,
}

/// Put `value` under `key` and clear the block it replaces.
pub async fn put_and_clear<S>(
    store: &S,
    key: &[u8],
    value: &[u8],
    opts: WriteOptions,
) -> Result<ImmediateOutcome>
where
    S: VersionedStore + ?Sized,
{
    let prior = store.get(key, GetOptions::wait()).await?;
    let has_cas = opts.has_cas();
    store.put(key, value, opts).await?;
    reclaim_prior(store, key, prior, has_cas).await
}

/// Delete `key` and clear the block that held its value.
pub async fn del_and_clear<S>(store: &S, key: &[u8], opts: WriteOptions) -> Result<ImmediateOutcome>
where
    S: VersionedStore + ?Sized,
{
    let prior = store.get(key, GetOptions::wait()).await?;
    let has_cas = opts.has_cas();
    store.del(key, opts).await?;
    reclaim_prior(store, key, prior, has_cas).await
}

async fn reclaim_prior<S>(
    store: &S,
    key: &[u8],
    prior: Option<Entry>,
    has_cas: bool,
) -> Result<ImmediateOutcome>
where
    S: VersionedStore + ?Sized,
{
    let Some(prior) = prior else {
        return Ok(ImmediateOutcome::NothingToReclaim);
    };

    if has_cas {
        // The prior entry still being live means the write did not happen
        let current = store.get(key, GetOptions::wait()).await?;
        if current.map(|e| e.seq) == Some(prior.seq) {
            debug!(seq = prior.seq, "cas rejected write, keeping block");
            return Ok(ImmediateOutcome::CasRejected);
        }
    }

    BlockReclaimer::new(store).reclaim(prior.seq).await?;
    Ok(ImmediateOutcome::Reclaimed(prior.seq))
}
