//! High-level compaction orchestrator.
//!
//! The Compactor owns a handle to a store and runs sweeps and immediate
//! writes against it with a fixed configuration, keeping cumulative
//! statistics and refusing to run two sweeps of one channel at once.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{CompactionError, Result};
use crate::immediate::{self, ImmediateOutcome};
use crate::liveness::LookupMode;
use crate::sweep::{self, SweepReport, DEFAULT_MAX_CACHE_SIZE};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use silt_log::{VersionedStore, WriteOptions};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Configuration for the compactor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Keys whose index answer is cached during one sweep. Zero disables
    /// the cache.
    pub max_cache_size: usize,

    /// How index lookups treat data that is not available locally.
    pub lookup_mode: LookupMode,

    /// Reject a sweep while another sweep of the same channel is running.
    pub guard_channels: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            lookup_mode: LookupMode::NonBlocking,
            guard_channels: true,
        }
    }
}

impl CompactionConfig {
    pub fn builder() -> CompactionConfigBuilder {
        CompactionConfigBuilder::new()
    }

    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for compaction configuration.
pub struct CompactionConfigBuilder {
    config: CompactionConfig,
}

impl CompactionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CompactionConfig::default(),
        }
    }

    pub fn max_cache_size(mut self, size: usize) -> Self {
        self.config.max_cache_size = size;
        self
    }

    pub fn lookup_mode(mut self, mode: LookupMode) -> Self {
        self.config.lookup_mode = mode;
        self
    }

    pub fn guard_channels(mut self, enabled: bool) -> Self {
        self.config.guard_channels = enabled;
        self
    }

    pub fn build(self) -> CompactionConfig {
        self.config
    }
}

impl Default for CompactionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about compaction operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    /// Sweeps that completed, including no-ops.
    pub sweeps_run: u64,

    /// Completed sweeps whose window was empty.
    pub sweeps_noop: u64,

    /// Sweeps that returned an error.
    pub sweeps_failed: u64,

    /// History entries judged by completed sweeps.
    pub entries_scanned: u64,

    /// Blocks cleared by completed sweeps.
    pub blocks_reclaimed: u64,

    /// Blocks cleared by `put_and_clear` and `del_and_clear`.
    pub immediate_reclaims: u64,

    /// Immediate writes whose CAS predicate rejected the mutation.
    pub cas_rejections: u64,

    /// Report of the most recent completed sweep.
    pub last_sweep: Option<SweepReport>,
}

/// Marks a channel as sweeping until dropped.
struct ChannelGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    channel: String,
}

impl<'a> ChannelGuard<'a> {
    fn acquire(active: &'a Mutex<HashSet<String>>, channel: &str) -> Result<Self> {
        if !active.lock().insert(channel.to_string()) {
            return Err(CompactionError::ChannelBusy(channel.to_string()));
        }
        Ok(ChannelGuard {
            active,
            channel: channel.to_string(),
        })
    }
}

impl Drop for ChannelGuard<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.channel);
    }
}

/// Runs compaction against one store.
pub struct Compactor<S: ?Sized> {
    store: Arc<S>,
    config: CompactionConfig,
    stats: RwLock<CompactionStats>,
    /// Channels with a sweep in progress.
    active: Mutex<HashSet<String>>,
}

impl<S> Compactor<S>
where
    S: VersionedStore + ?Sized,
{
    /// Create a compactor with the default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, CompactionConfig::default())
    }

    /// Create a compactor with custom configuration.
    pub fn with_config(store: Arc<S>, config: CompactionConfig) -> Self {
        Compactor {
            store,
            config,
            stats: RwLock::new(CompactionStats::default()),
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Snapshot of the cumulative statistics.
    pub fn stats(&self) -> CompactionStats {
        self.stats.read().clone()
    }

    /// Whether a sweep of `channel` is currently running.
    pub fn is_sweeping(&self, channel: &str) -> bool {
        self.active.lock().contains(channel)
    }

    /// Current checkpoint of a channel.
    pub async fn checkpoint(&self, channel: &str) -> Result<Checkpoint> {
        CheckpointStore::new(self.store.as_ref()).load(channel).await
    }

    /// Sweep a channel with the configured cache size.
    pub async fn sweep(&self, channel: &str) -> Result<SweepReport> {
        self.sweep_with_cache(channel, self.config.max_cache_size)
            .await
    }

    /// Sweep a channel with a one-off cache size.
    pub async fn sweep_with_cache(
        &self,
        channel: &str,
        max_cache_size: usize,
    ) -> Result<SweepReport> {
        let _guard = if self.config.guard_channels {
            Some(ChannelGuard::acquire(&self.active, channel)?)
        } else {
            None
        };

        let result = sweep::sweep_with_mode(
            self.store.as_ref(),
            channel,
            max_cache_size,
            self.config.lookup_mode,
        )
        .await;

        let mut stats = self.stats.write();
        match &result {
            Ok(report) => {
                stats.sweeps_run += 1;
                if report.is_noop() {
                    stats.sweeps_noop += 1;
                }
                stats.entries_scanned += report.scanned;
                stats.blocks_reclaimed += report.reclaimed;
                stats.last_sweep = Some(report.clone());
            }
            Err(e) => {
                stats.sweeps_failed += 1;
                if !e.is_retryable() {
                    warn!(channel, error = %e, "sweep failed permanently");
                }
            }
        }
        result
    }

    /// Put a value and clear the block it supersedes.
    pub async fn put_and_clear(
        &self,
        key: &[u8],
        value: &[u8],
        opts: WriteOptions,
    ) -> Result<ImmediateOutcome> {
        let outcome = immediate::put_and_clear(self.store.as_ref(), key, value, opts).await?;
        self.record(outcome);
        Ok(outcome)
    }

    /// Delete a key and clear the block that held its value.
    pub async fn del_and_clear(&self, key: &[u8], opts: WriteOptions) -> Result<ImmediateOutcome> {
        let outcome = immediate::del_and_clear(self.store.as_ref(), key, opts).await?;
        self.record(outcome);
        Ok(outcome)
    }

    fn record(&self, outcome: ImmediateOutcome) {
        let mut stats = self.stats.write();
        match outcome {
            ImmediateOutcome::Reclaimed(_) => stats.immediate_reclaims += 1,
            ImmediateOutcome::CasRejected => stats.cas_rejections += 1,
            ImmediateOutcome::NothingToReclaim => {}
        }
    }
}
