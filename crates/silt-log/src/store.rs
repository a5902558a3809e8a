//! The versioned store contract.
//!
//! A `VersionedStore` is an append-only log of put/del blocks plus an index
//! from each key to its live block. Compaction only ever talks to the log
//! through this trait.

use crate::entry::{Entry, Seq, SeqRange};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// Compare-and-swap predicate, called with `(previous, proposed)`.
///
/// Only consulted when the key already has a live entry. Returning `false`
/// turns the write into a no-op.
pub type CasPredicate = Arc<dyn Fn(&Entry, &Entry) -> bool + Send + Sync>;

/// Options for reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetOptions {
    /// Wait for data that is not available locally. When `false`, missing
    /// data is reported as absent instead.
    pub wait: bool,
}

impl GetOptions {
    pub fn wait() -> Self {
        GetOptions { wait: true }
    }

    pub fn no_wait() -> Self {
        GetOptions { wait: false }
    }
}

impl Default for GetOptions {
    fn default() -> Self {
        Self::wait()
    }
}

/// Options for puts and deletes.
#[derive(Clone, Default)]
pub struct WriteOptions {
    pub cas: Option<CasPredicate>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cas<F>(predicate: F) -> Self
    where
        F: Fn(&Entry, &Entry) -> bool + Send + Sync + 'static,
    {
        WriteOptions {
            cas: Some(Arc::new(predicate)),
        }
    }

    pub fn has_cas(&self) -> bool {
        self.cas.is_some()
    }
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("cas", &self.cas.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// Async contract for an append-only versioned key-value log.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Current live entry for a key.
    async fn get(&self, key: &[u8], opts: GetOptions) -> Result<Option<Entry>>;

    /// Append a put. Returns the new entry, or `None` if a CAS predicate
    /// rejected the write.
    async fn put(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> Result<Option<Entry>>;

    /// Append a tombstone for a key. Deleting an absent key appends nothing.
    async fn del(&self, key: &[u8], opts: WriteOptions) -> Result<()>;

    /// Entries with seq in `range`, in increasing seq order.
    ///
    /// The stream is finite and not restartable; call again to start over.
    fn history(&self, range: SeqRange) -> BoxStream<'_, Result<Entry>>;

    /// One past the highest assigned seq.
    fn length(&self) -> Seq;

    /// Positional read of the entry stored at `seq`.
    async fn get_block(&self, seq: Seq, opts: GetOptions) -> Result<Option<Entry>>;

    /// Release the storage of one block. Idempotent, and a no-op for
    /// positions that were already cleared or never existed.
    async fn clear(&self, seq: Seq) -> Result<()>;

    /// Opaque metadata attached to the structure.
    async fn get_user_data(&self, id: &str) -> Result<Option<Vec<u8>>>;

    async fn set_user_data(&self, id: &str, data: &[u8]) -> Result<()>;
}
