//! Deciding whether a historical entry is still the live version of its key.

use crate::cache::BoundedCache;
use serde::{Deserialize, Serialize};
use silt_log::{Entry, GetOptions, LogError, Seq, VersionedStore};

/// Resolved index answer for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachedSeq {
    /// The key's live entry is at this seq.
    Live(Seq),
    /// The key was confirmed to have no live entry.
    Absent,
}

impl CachedSeq {
    pub fn is_live_at(&self, seq: Seq) -> bool {
        matches!(self, CachedSeq::Live(live) if *live == seq)
    }
}

/// How index lookups treat data that is not available locally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Report unavailable data as absent instead of waiting.
    #[default]
    NonBlocking,
    /// Wait for data; unavailability is an error.
    Blocking,
}

impl LookupMode {
    fn get_options(self) -> GetOptions {
        match self {
            LookupMode::NonBlocking => GetOptions::no_wait(),
            LookupMode::Blocking => GetOptions::wait(),
        }
    }
}

/// Classifies history entries as live or superseded.
///
/// Each key is looked up in the index at most once while it stays cached,
/// however many of its historical entries are checked.
pub struct LivenessResolver<'a, S: ?Sized> {
    store: &'a S,
    cache: BoundedCache<Vec<u8>, CachedSeq>,
    mode: LookupMode,
    index_lookups: u64,
    cache_hits: u64,
}

impl<'a, S> LivenessResolver<'a, S>
where
    S: VersionedStore + ?Sized,
{
    pub fn new(store: &'a S, max_cache_size: usize, mode: LookupMode) -> Self {
        LivenessResolver {
            store,
            cache: BoundedCache::new(max_cache_size),
            mode,
            index_lookups: 0,
            cache_hits: 0,
        }
    }

    /// Whether `entry` is the live version of its key.
    ///
    /// Tombstones are never live.
    pub async fn is_live(&mut self, entry: &Entry) -> Result<bool, LogError> {
        if entry.is_tombstone() {
            return Ok(false);
        }

        if let Some(cached) = self.cache.get(entry.key.as_slice()).copied() {
            self.cache_hits += 1;
            return Ok(cached.is_live_at(entry.seq));
        }

        let resolved = self.resolve(&entry.key).await?;
        self.cache.insert(entry.key.clone(), resolved);
        Ok(resolved.is_live_at(entry.seq))
    }

    async fn resolve(&mut self, key: &[u8]) -> Result<CachedSeq, LogError> {
        self.index_lookups += 1;
        match self.store.get(key, self.mode.get_options()).await {
            Ok(Some(live)) => Ok(CachedSeq::Live(live.seq)),
            Ok(None) => Ok(CachedSeq::Absent),
            Err(LogError::Unavailable(_) | LogError::IndexUnavailable)
                if self.mode == LookupMode::NonBlocking =>
            {
                Ok(CachedSeq::Absent)
            }
            Err(e) => Err(e),
        }
    }

    pub fn index_lookups(&self) -> u64 {
        self.index_lookups
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn cache(&self) -> &BoundedCache<Vec<u8>, CachedSeq> {
        &self.cache
    }
}
