//! # silt-log
//!
//! The append-only versioned log that Silt compacts.
//!
//! This crate provides:
//! - `Entry` and `Seq`: positional, immutable put/del records
//! - `VersionedStore`: the narrow async contract the compaction engine consumes
//!   (live lookups, writes with compare-and-swap, history streams, block
//!   clearing, per-structure user data)
//! - `MemoryStore`: an in-memory reference implementation of the contract
//! - `codec`: fixed-width binary helpers for 48-bit sequence numbers
//!
//! ## Example
//!
//! ```rust,ignore
//! use silt_log::{GetOptions, MemoryStore, VersionedStore, WriteOptions};
//!
//! let store = MemoryStore::new();
//!
//! // Position 0 is the header, so the first write lands at seq 1
//! let entry = store.put(b"a", b"v1", WriteOptions::new()).await?.unwrap();
//! assert_eq!(entry.seq, 1);
//!
//! // Superseded blocks stay in the log until they are cleared
//! store.put(b"a", b"v2", WriteOptions::new()).await?;
//! assert!(store.get_block(1, GetOptions::no_wait()).await?.is_some());
//! store.clear(1).await?;
//! assert!(store.get_block(1, GetOptions::no_wait()).await?.is_none());
//! ```

pub mod codec;
mod entry;
mod error;
mod memory;
mod store;

pub use codec::CodecError;
pub use entry::{Entry, EntryKind, Seq, SeqRange, MAX_SEQ};
pub use error::{LogError, Result};
pub use memory::MemoryStore;
pub use store::{CasPredicate, GetOptions, VersionedStore, WriteOptions};
