//! Incremental history sweeps.
//!
//! A sweep walks the part of the history that previous sweeps of the same
//! channel have not seen, reclaims every entry that is no longer the live
//! version of its key, and records where it stopped.
//!
//! The window of one sweep is `[next_clearing, length - 1)`. The newest block
//! is never judged; it becomes part of the next window once something is
//! appended after it.

use crate::checkpoint::{validate_channel_id, Checkpoint, CheckpointStore};
use crate::error::Result;
use crate::liveness::{LivenessResolver, LookupMode};
use crate::reclaimer::BlockReclaimer;
use futures::StreamExt;
use serde::Serialize;
use silt_log::{Seq, SeqRange, VersionedStore};
use tracing::{debug, info, warn};

/// Lookup cache size used when the caller does not choose one.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;

/// Outcome of one sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub channel: String,
    /// Checkpoint the sweep started from.
    pub previous: Checkpoint,
    /// Seqs this sweep was responsible for.
    pub window: SeqRange,
    pub scanned: u64,
    pub reclaimed: u64,
    pub retained: u64,
    pub index_lookups: u64,
    pub cache_hits: u64,
    /// One past the highest seq reclaimed by this sweep, or the previous
    /// `last_cleared` if nothing was reclaimed. Not persisted.
    pub high_water: Seq,
    /// Checkpoint written at the end, `None` when the window was empty.
    pub checkpoint: Option<Checkpoint>,
}

impl SweepReport {
    fn empty(channel: &str, previous: Checkpoint, window: SeqRange) -> Self {
        SweepReport {
            channel: channel.to_string(),
            previous,
            window,
            scanned: 0,
            reclaimed: 0,
            retained: 0,
            index_lookups: 0,
            cache_hits: 0,
            high_water: previous.last_cleared,
            checkpoint: None,
        }
    }

    /// Whether the sweep had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.checkpoint.is_none()
    }
}

/// Sweep a channel with non-blocking index lookups.
pub async fn sweep<S>(store: &S, id: &str, max_cache_size: usize) -> Result<SweepReport>
where
    S: VersionedStore + ?Sized,
{
    sweep_with_mode(store, id, max_cache_size, LookupMode::NonBlocking).await
}

/// Sweep a channel.
///
/// Callers must not run two sweeps of the same channel at once. On error the
/// stored checkpoint is left as it was, so the sweep can simply be retried.
pub async fn sweep_with_mode<S>(
    store: &S,
    id: &str,
    max_cache_size: usize,
    mode: LookupMode,
) -> Result<SweepReport>
where
    S: VersionedStore + ?Sized,
{
    validate_channel_id(id)?;
    let checkpoints = CheckpointStore::new(store);
    let previous = checkpoints.load(id).await?;

    let upper = store.length().saturating_sub(1);
    let window = SeqRange::new(previous.next_clearing, upper);
    let mut report = SweepReport::empty(id, previous, window);

    if window.is_empty() {
        debug!(channel = id, %window, "nothing to sweep");
        return Ok(report);
    }

    debug!(channel = id, %window, max_cache_size, ?mode, "sweep started");
    scan_window(store, window, max_cache_size, mode, &mut report)
        .await
        .inspect_err(|e| warn!(channel = id, %window, error = %e, "sweep aborted"))?;

    let next = Checkpoint::at(upper);
    checkpoints.save(id, next).await?;
    report.checkpoint = Some(next);

    info!(
        channel = id,
        %window,
        scanned = report.scanned,
        reclaimed = report.reclaimed,
        retained = report.retained,
        "sweep finished"
    );
    Ok(report)
}

async fn scan_window<S>(
    store: &S,
    window: SeqRange,
    max_cache_size: usize,
    mode: LookupMode,
    report: &mut SweepReport,
) -> Result<()>
where
    S: VersionedStore + ?Sized,
{
    let mut resolver = LivenessResolver::new(store, max_cache_size, mode);
    let mut reclaimer = BlockReclaimer::new(store);
    let mut history = store.history(window);

    while let Some(entry) = history.next().await {
        let entry = entry?;
        report.scanned += 1;

        if resolver.is_live(&entry).await? {
            report.retained += 1;
            continue;
        }

        reclaimer.reclaim(entry.seq).await?;
        report.reclaimed += 1;
        report.high_water = entry.seq + 1;
    }

    report.index_lookups = resolver.index_lookups();
    report.cache_hits = resolver.cache_hits();
    Ok(())
}
