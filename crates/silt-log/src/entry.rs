//! Log entries and sequence ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a block in the log.
///
/// Assigned at append time and strictly increasing. Only the low 48 bits are
/// ever used.
pub type Seq = u64;

/// Largest sequence number a log may assign.
pub const MAX_SEQ: Seq = (1 << 48) - 1;

/// Operation recorded by an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Put,
    Del,
}

/// A single put or delete record in the log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub seq: Seq,
    pub key: Vec<u8>,
    /// `None` for tombstones.
    pub value: Option<Vec<u8>>,
    pub kind: EntryKind,
}

impl Entry {
    pub fn put(seq: Seq, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Entry {
            seq,
            key: key.into(),
            value: Some(value.into()),
            kind: EntryKind::Put,
        }
    }

    pub fn tombstone(seq: Seq, key: impl Into<Vec<u8>>) -> Self {
        Entry {
            seq,
            key: key.into(),
            value: None,
            kind: EntryKind::Del,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.kind == EntryKind::Del
    }

    /// Value as UTF-8, if present and valid.
    pub fn value_str(&self) -> Option<&str> {
        self.value
            .as_deref()
            .and_then(|v| std::str::from_utf8(v).ok())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = String::from_utf8_lossy(&self.key);
        match self.kind {
            EntryKind::Put => write!(
                f,
                "#{} put {} = {}",
                self.seq,
                key,
                String::from_utf8_lossy(self.value.as_deref().unwrap_or_default())
            ),
            EntryKind::Del => write!(f, "#{} del {}", self.seq, key),
        }
    }
}

/// Half-open range of sequence numbers, `[gte, lt)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqRange {
    pub gte: Seq,
    pub lt: Seq,
}

impl SeqRange {
    pub fn new(gte: Seq, lt: Seq) -> Self {
        SeqRange { gte, lt }
    }

    pub fn is_empty(&self) -> bool {
        self.gte >= self.lt
    }

    pub fn len(&self) -> u64 {
        self.lt.saturating_sub(self.gte)
    }

    pub fn contains(&self, seq: Seq) -> bool {
        seq >= self.gte && seq < self.lt
    }
}

impl fmt::Display for SeqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.gte, self.lt)
    }
}
