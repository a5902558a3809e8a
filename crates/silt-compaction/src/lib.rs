//! # silt-compaction
//!
//! Incremental compaction for Silt append-only versioned logs.
//!
//! Every write to a log appends a block; superseded values and tombstones
//! stay in the history until something releases their storage. This crate
//! provides:
//! - Sweeps: walk the part of the history not yet examined by a channel,
//!   clear every entry that is no longer the live version of its key, and
//!   persist a checkpoint so the next sweep starts where this one stopped
//! - Immediate writes: `put_and_clear` / `del_and_clear` clear the block a
//!   write supersedes as soon as the write lands, honoring CAS predicates
//! - Liveness checks backed by a bounded FIFO cache of index answers
//! - Checkpoints stored as user data on the log they describe
//!
//! ## Architecture
//!
//! A sweep never judges the newest block, and liveness is always decided by
//! the key's current index pointer, so the live version of a key is never
//! cleared. Checkpoints are written only after a whole window has been
//! processed; a failed or cancelled sweep is retried from the previous
//! checkpoint.
//!
//! ## Example
//!
//! ```rust,ignore
//! use silt_compaction::{CompactionConfig, Compactor};
//! use silt_log::{MemoryStore, WriteOptions};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let compactor = Compactor::with_config(
//!     store.clone(),
//!     CompactionConfig::builder().max_cache_size(256).build(),
//! );
//!
//! store.put(b"a", b"1", WriteOptions::new()).await?;
//! store.put(b"a", b"2", WriteOptions::new()).await?;
//! store.put(b"b", b"1", WriteOptions::new()).await?;
//!
//! // Clears seq 1, the superseded value of "a"
//! let report = compactor.sweep("compaction").await?;
//! assert_eq!(report.reclaimed, 1);
//! ```

mod cache;
mod checkpoint;
mod compactor;
mod error;
mod immediate;
mod liveness;
mod reclaimer;
mod sweep;

pub use cache::BoundedCache;
pub use checkpoint::{Checkpoint, CheckpointStore, CHECKPOINT_LEN};
pub use compactor::{CompactionConfig, CompactionConfigBuilder, CompactionStats, Compactor};
pub use error::{CompactionError, Result};
pub use immediate::{del_and_clear, put_and_clear, ImmediateOutcome};
pub use liveness::{CachedSeq, LivenessResolver, LookupMode};
pub use reclaimer::BlockReclaimer;
pub use sweep::{sweep, sweep_with_mode, SweepReport, DEFAULT_MAX_CACHE_SIZE};
