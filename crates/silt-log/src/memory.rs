//! In-memory implementation of [`VersionedStore`].
//!
//! Position 0 holds a header block, so the first entry is written at seq 1.
//! Cleared blocks keep their position but lose their payload.

use crate::entry::{Entry, Seq, SeqRange, MAX_SEQ};
use crate::error::{LogError, Result};
use crate::store::{GetOptions, VersionedStore, WriteOptions};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

const DEFAULT_HEADER: &[u8] = b"silt/v1";

#[derive(Clone, Debug)]
enum Block {
    Header(Vec<u8>),
    Put { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

impl Block {
    fn to_entry(&self, seq: Seq) -> Option<Entry> {
        match self {
            Block::Header(_) => None,
            Block::Put { key, value } => Some(Entry::put(seq, key.clone(), value.clone())),
            Block::Del { key } => Some(Entry::tombstone(seq, key.clone())),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// `None` marks a cleared block.
    blocks: Vec<Option<Block>>,
    index: BTreeMap<Vec<u8>, Seq>,
    user_data: HashMap<String, Vec<u8>>,
    cleared: usize,
}

impl Inner {
    fn next_seq(&self) -> Result<Seq> {
        let seq = self.blocks.len() as Seq;
        if seq > MAX_SEQ {
            return Err(LogError::SeqOverflow(seq));
        }
        Ok(seq)
    }

    fn read_block(&self, seq: Seq, opts: GetOptions) -> Result<Option<Entry>> {
        match self.blocks.get(seq as usize) {
            None => Ok(None),
            Some(None) if opts.wait => Err(LogError::Unavailable(seq)),
            Some(None) => Ok(None),
            Some(Some(block)) => Ok(block.to_entry(seq)),
        }
    }

    fn live_entry(&self, key: &[u8]) -> Result<Option<Entry>> {
        match self.index.get(key) {
            Some(&seq) => self.read_block(seq, GetOptions::wait()),
            None => Ok(None),
        }
    }
}

/// Thread-safe in-memory versioned store.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    index_online: AtomicBool,
    history_fault: Mutex<Option<Seq>>,
}

impl MemoryStore {
    /// Create a store holding only the header block.
    pub fn new() -> Self {
        Self::with_header(DEFAULT_HEADER.to_vec())
    }

    pub fn with_header(header: Vec<u8>) -> Self {
        let inner = Inner {
            blocks: vec![Some(Block::Header(header))],
            ..Default::default()
        };
        MemoryStore {
            inner: RwLock::new(inner),
            index_online: AtomicBool::new(true),
            history_fault: Mutex::new(None),
        }
    }

    /// Simulate an index that has not been replicated locally.
    ///
    /// While offline, non-blocking lookups report every key as absent and
    /// blocking lookups fail with [`LogError::IndexUnavailable`].
    pub fn set_index_online(&self, online: bool) {
        self.index_online.store(online, Ordering::Release);
    }

    /// Make history streams fail with an I/O error when they reach `seq`.
    pub fn inject_history_fault(&self, seq: Option<Seq>) {
        *self.history_fault.lock() = seq;
    }

    /// Payload of the header block at seq 0, `None` once it is cleared.
    pub fn header(&self) -> Option<Vec<u8>> {
        match self.inner.read().blocks.first() {
            Some(Some(Block::Header(header))) => Some(header.clone()),
            _ => None,
        }
    }

    /// Whether the block at `seq` exists and has been cleared.
    pub fn is_cleared(&self, seq: Seq) -> bool {
        matches!(self.inner.read().blocks.get(seq as usize), Some(None))
    }

    /// Whether the block at `seq` exists and still holds data.
    pub fn has_block(&self, seq: Seq) -> bool {
        matches!(self.inner.read().blocks.get(seq as usize), Some(Some(_)))
    }

    /// Number of blocks released so far.
    pub fn cleared_count(&self) -> usize {
        self.inner.read().cleared
    }

    /// Snapshot of the index: every key with a live entry and its seq.
    pub fn live_index(&self) -> Vec<(Vec<u8>, Seq)> {
        self.inner
            .read()
            .index
            .iter()
            .map(|(k, s)| (k.clone(), *s))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    async fn get(&self, key: &[u8], opts: GetOptions) -> Result<Option<Entry>> {
        if !self.index_online.load(Ordering::Acquire) {
            return if opts.wait {
                Err(LogError::IndexUnavailable)
            } else {
                Ok(None)
            };
        }

        let inner = self.inner.read();
        match inner.index.get(key) {
            Some(&seq) => inner.read_block(seq, opts),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> Result<Option<Entry>> {
        let mut inner = self.inner.write();
        let seq = inner.next_seq()?;

        if let Some(cas) = &opts.cas {
            if let Some(prev) = inner.live_entry(key)? {
                let proposed = Entry::put(seq, key, value);
                if !cas(&prev, &proposed) {
                    debug!(seq = prev.seq, "put rejected by cas predicate");
                    return Ok(None);
                }
            }
        }

        inner.blocks.push(Some(Block::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }));
        inner.index.insert(key.to_vec(), seq);
        Ok(Some(Entry::put(seq, key, value)))
    }

    async fn del(&self, key: &[u8], opts: WriteOptions) -> Result<()> {
        let mut inner = self.inner.write();
        let Some(prev) = inner.live_entry(key)? else {
            return Ok(());
        };
        let seq = inner.next_seq()?;

        if let Some(cas) = &opts.cas {
            if !cas(&prev, &Entry::tombstone(seq, key)) {
                debug!(seq = prev.seq, "del rejected by cas predicate");
                return Ok(());
            }
        }

        inner.blocks.push(Some(Block::Del { key: key.to_vec() }));
        inner.index.remove(key);
        Ok(())
    }

    fn history(&self, range: SeqRange) -> BoxStream<'_, Result<Entry>> {
        stream::unfold(range.gte, move |cursor| async move {
            let mut seq = cursor;
            loop {
                if seq >= range.lt {
                    return None;
                }
                if *self.history_fault.lock() == Some(seq) {
                    let err = LogError::Io(format!("failed to read block {}", seq));
                    return Some((Err(err), range.lt));
                }

                let entry = {
                    let inner = self.inner.read();
                    match inner.blocks.get(seq as usize) {
                        None => return None,
                        Some(slot) => slot.as_ref().and_then(|b| b.to_entry(seq)),
                    }
                };
                seq += 1;

                if let Some(entry) = entry {
                    return Some((Ok(entry), seq));
                }
            }
        })
        .boxed()
    }

    fn length(&self) -> Seq {
        self.inner.read().blocks.len() as Seq
    }

    async fn get_block(&self, seq: Seq, opts: GetOptions) -> Result<Option<Entry>> {
        self.inner.read().read_block(seq, opts)
    }

    async fn clear(&self, seq: Seq) -> Result<()> {
        let mut inner = self.inner.write();
        let released = inner
            .blocks
            .get_mut(seq as usize)
            .map(|slot| slot.take().is_some())
            .unwrap_or(false);
        if released {
            inner.cleared += 1;
            trace!(seq, "block cleared");
        }
        Ok(())
    }

    async fn get_user_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().user_data.get(id).cloned())
    }

    async fn set_user_data(&self, id: &str, data: &[u8]) -> Result<()> {
        self.inner
            .write()
            .user_data
            .insert(id.to_string(), data.to_vec());
        Ok(())
    }
}
