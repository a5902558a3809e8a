//! End-to-end compaction scenarios against the in-memory store.

use silt_compaction::{
    del_and_clear, put_and_clear, sweep, Checkpoint, CheckpointStore, CompactionConfig,
    Compactor, ImmediateOutcome, LookupMode, SweepReport,
};
use silt_log::{GetOptions, MemoryStore, Seq, SeqRange, VersionedStore, WriteOptions};
use std::sync::Arc;

async fn put(store: &MemoryStore, key: &str, value: &str) -> Seq {
    store
        .put(key.as_bytes(), value.as_bytes(), WriteOptions::new())
        .await
        .unwrap()
        .unwrap()
        .seq
}

async fn del(store: &MemoryStore, key: &str) {
    store.del(key.as_bytes(), WriteOptions::new()).await.unwrap();
}

async fn value(store: &MemoryStore, key: &str) -> Option<(Seq, String)> {
    store
        .get(key.as_bytes(), GetOptions::wait())
        .await
        .unwrap()
        .map(|e| (e.seq, e.value_str().unwrap_or_default().to_string()))
}

async fn block_present(store: &MemoryStore, seq: Seq) -> bool {
    store
        .get_block(seq, GetOptions::no_wait())
        .await
        .unwrap()
        .is_some()
}

async fn stored(store: &MemoryStore, id: &str) -> Checkpoint {
    CheckpointStore::new(store).load(id).await.unwrap()
}

#[tokio::test]
async fn superseded_values_are_reclaimed() {
    let store = MemoryStore::new();
    put(&store, "A", "v1").await; // 1
    put(&store, "other", "x").await; // 2
    put(&store, "A", "v3").await; // 3
    put(&store, "other", "y").await; // 4
    put(&store, "A", "v5").await; // 5

    let report = sweep(&store, "compaction", 1000).await.unwrap();

    assert_eq!(report.window, SeqRange::new(0, 5));
    assert!(!block_present(&store, 1).await);
    assert!(!block_present(&store, 3).await);
    assert!(!block_present(&store, 2).await);
    assert!(block_present(&store, 5).await);
    assert_eq!(value(&store, "A").await, Some((5, "v5".to_string())));
}

#[tokio::test]
async fn tombstones_are_reclaimed_once_covered() {
    let store = MemoryStore::new();
    put(&store, "x", "1").await; // 1
    put(&store, "B", "b").await; // 2
    put(&store, "x", "3").await; // 3
    del(&store, "B").await; // 4

    let first = sweep(&store, "compaction", 1000).await.unwrap();
    assert_eq!(first.window, SeqRange::new(0, 4));
    assert!(!block_present(&store, 2).await);
    assert!(block_present(&store, 4).await);
    assert_eq!(value(&store, "B").await, None);

    put(&store, "x", "5").await; // 5

    let second = sweep(&store, "compaction", 1000).await.unwrap();
    assert_eq!(second.window, SeqRange::new(4, 5));
    assert!(!block_present(&store, 4).await);
    assert_eq!(value(&store, "B").await, None);
}

/// Eleven writes swept in one go: only the live version of each key and the
/// newest block survive.
#[tokio::test]
async fn mixed_workload_in_one_sweep() {
    let store = MemoryStore::new();
    put(&store, "readded", "1").await; // 1
    put(&store, "once", "2").await; // 2
    put(&store, "readded", "3").await; // 3
    del(&store, "readded").await; // 4
    put(&store, "readded", "5").await; // 5
    put(&store, "twice", "6").await; // 6
    put(&store, "twice", "7").await; // 7
    put(&store, "removed", "8").await; // 8
    del(&store, "removed").await; // 9
    put(&store, "unchanged", "10").await; // 10
    del(&store, "unchanged").await; // 11

    let report = sweep(&store, "clear", 10).await.unwrap();

    for seq in [1, 3, 4, 6, 8, 9, 10] {
        assert!(!block_present(&store, seq).await, "seq {seq} should be reclaimed");
    }
    for seq in [2, 5, 7] {
        assert!(block_present(&store, seq).await, "seq {seq} is live");
    }
    assert!(block_present(&store, 11).await, "newest block is never judged");

    assert_eq!(value(&store, "once").await, Some((2, "2".to_string())));
    assert_eq!(value(&store, "readded").await, Some((5, "5".to_string())));
    assert_eq!(value(&store, "twice").await, Some((7, "7".to_string())));
    assert_eq!(report.reclaimed, 7);
    assert_eq!(report.retained, 3);
    assert_eq!(stored(&store, "clear").await, Checkpoint::at(11));
}

/// A key that dies after its window was swept is not revisited.
#[tokio::test]
async fn sweeps_resume_from_checkpoint() {
    let store = MemoryStore::new();
    put(&store, "irrelevant1", "1").await; // 1
    put(&store, "late", "2").await; // 2
    del(&store, "irrelevant1").await; // 3
    put(&store, "irrelevant2", "4").await; // 4

    sweep(&store, "clear", 10).await.unwrap();
    assert_eq!(stored(&store, "clear").await, Checkpoint::at(4));

    del(&store, "late").await; // 5
    put(&store, "irrelevant3", "6").await; // 6

    let report = sweep(&store, "clear", 10).await.unwrap();
    assert_eq!(report.previous, Checkpoint::at(4));
    assert_eq!(report.window, SeqRange::new(4, 6));
    assert_eq!(stored(&store, "clear").await, Checkpoint::at(6));

    assert!(!block_present(&store, 5).await);
    // Below the checkpoint, so left for good
    assert!(block_present(&store, 2).await);
    assert!(block_present(&store, 4).await);
}

/// A JSON checkpoint `[next, ceiling]` left by older writers resumes at `next`.
#[tokio::test]
async fn json_checkpoint_resumes_below_its_ceiling() {
    let store = MemoryStore::new();
    for i in 1..=5 {
        put(&store, "a", &i.to_string()).await;
    }
    store.set_user_data("clear", b"[1,4]").await.unwrap();

    let report = sweep(&store, "clear", 10).await.unwrap();
    assert_eq!(report.previous, Checkpoint::at(1));
    assert_eq!(report.window, SeqRange::new(1, 5));
    assert_eq!(report.reclaimed, 4);
    for seq in 1..=4 {
        assert!(!block_present(&store, seq).await, "seq {} kept", seq);
    }
    assert!(block_present(&store, 5).await);
    assert_eq!(stored(&store, "clear").await, Checkpoint::at(5));
}

#[tokio::test]
async fn second_sweep_without_writes_is_idempotent() {
    let store = MemoryStore::new();
    for i in 0..20 {
        put(&store, &format!("k{}", i % 4), &i.to_string()).await;
    }

    let first = sweep(&store, "compaction", 1000).await.unwrap();
    let cleared = store.cleared_count();
    let checkpoint = stored(&store, "compaction").await;

    let second = sweep(&store, "compaction", 1000).await.unwrap();
    assert!(first.reclaimed > 0);
    assert!(second.is_noop());
    assert_eq!(second.reclaimed, 0);
    assert_eq!(store.cleared_count(), cleared);
    assert_eq!(stored(&store, "compaction").await, checkpoint);
}

#[tokio::test]
async fn channels_keep_independent_checkpoints() {
    let store = MemoryStore::new();
    put(&store, "a", "1").await;
    put(&store, "a", "2").await;
    put(&store, "b", "1").await;

    sweep(&store, "first", 10).await.unwrap();
    put(&store, "b", "2").await;

    let other: SweepReport = sweep(&store, "second", 10).await.unwrap();
    assert_eq!(other.previous, Checkpoint::default());
    assert_eq!(other.window, SeqRange::new(0, 4));
    assert_eq!(stored(&store, "first").await, Checkpoint::at(3));
    assert_eq!(stored(&store, "second").await, Checkpoint::at(4));
}

#[tokio::test]
async fn tiny_cache_gives_same_result() {
    let build = || async {
        let store = MemoryStore::new();
        for i in 0..40 {
            put(&store, &format!("k{}", i % 7), &i.to_string()).await;
            if i % 5 == 0 {
                del(&store, &format!("k{}", (i + 3) % 7)).await;
            }
        }
        store
    };

    let large = build().await;
    let small = build().await;
    let a = sweep(&large, "c", 1000).await.unwrap();
    let b = sweep(&small, "c", 1).await.unwrap();

    assert_eq!(a.reclaimed, b.reclaimed);
    assert_eq!(large.live_index(), small.live_index());
    assert!(b.index_lookups >= a.index_lookups);
}

#[tokio::test]
async fn put_and_clear_twice() {
    let store = MemoryStore::new();

    put_and_clear(&store, b"testPutKey", b"1", WriteOptions::new())
        .await
        .unwrap();
    assert_eq!(value(&store, "testPutKey").await, Some((1, "1".to_string())));

    put_and_clear(&store, b"testPutKey", b"2", WriteOptions::new())
        .await
        .unwrap();
    assert!(!block_present(&store, 1).await);
    assert_eq!(value(&store, "testPutKey").await, Some((2, "2".to_string())));

    let rejected = put_and_clear(
        &store,
        b"testPutKey",
        b"3",
        WriteOptions::with_cas(|_, _| false),
    )
    .await
    .unwrap();
    assert_eq!(rejected, ImmediateOutcome::CasRejected);
    assert_eq!(value(&store, "testPutKey").await, Some((2, "2".to_string())));

    let accepted = put_and_clear(
        &store,
        b"testPutKey",
        b"3",
        WriteOptions::with_cas(|_, _| true),
    )
    .await
    .unwrap();
    assert_eq!(accepted, ImmediateOutcome::Reclaimed(2));
    assert_eq!(value(&store, "testPutKey").await, Some((3, "3".to_string())));
    assert!(!block_present(&store, 2).await);
}

#[tokio::test]
async fn del_and_clear_with_and_without_cas() {
    let store = MemoryStore::new();
    let key = b"testDelKey";

    del_and_clear(&store, key, WriteOptions::new()).await.unwrap();
    assert_eq!(store.length(), 1, "deleting a missing key appends nothing");

    put_and_clear(&store, key, b"1", WriteOptions::new())
        .await
        .unwrap();
    del_and_clear(&store, key, WriteOptions::new()).await.unwrap();
    assert!(!block_present(&store, 1).await);
    assert_eq!(value(&store, "testDelKey").await, None);

    put_and_clear(&store, key, b"3", WriteOptions::new())
        .await
        .unwrap();
    del_and_clear(&store, key, WriteOptions::with_cas(|_, _| false))
        .await
        .unwrap();
    assert_eq!(value(&store, "testDelKey").await, Some((3, "3".to_string())));

    del_and_clear(&store, key, WriteOptions::with_cas(|_, _| true))
        .await
        .unwrap();
    assert_eq!(value(&store, "testDelKey").await, None);
    assert!(!block_present(&store, 3).await);
}

#[tokio::test]
async fn cas_predicate_sees_previous_and_proposed_entries() {
    let store = MemoryStore::new();
    put_and_clear(&store, b"n", b"1", WriteOptions::new())
        .await
        .unwrap();

    // Only accept increasing values
    let increasing = || {
        WriteOptions::with_cas(|prev, next| match (&prev.value, &next.value) {
            (Some(p), Some(n)) => n > p,
            _ => true,
        })
    };

    let lower = put_and_clear(&store, b"n", b"0", increasing()).await.unwrap();
    assert_eq!(lower, ImmediateOutcome::CasRejected);

    let higher = put_and_clear(&store, b"n", b"5", increasing()).await.unwrap();
    assert_eq!(higher, ImmediateOutcome::Reclaimed(1));
    assert_eq!(value(&store, "n").await, Some((2, "5".to_string())));
}

#[tokio::test]
async fn immediate_writes_and_sweeps_mix() {
    let store = Arc::new(MemoryStore::new());
    let compactor = Compactor::new(store.clone());

    compactor
        .put_and_clear(b"a", b"1", WriteOptions::new())
        .await
        .unwrap();
    compactor
        .put_and_clear(b"a", b"2", WriteOptions::new())
        .await
        .unwrap();
    compactor
        .del_and_clear(b"a", WriteOptions::new())
        .await
        .unwrap();
    compactor
        .put_and_clear(b"b", b"1", WriteOptions::new())
        .await
        .unwrap();

    // Seqs 1 and 2 are already gone; the sweep picks up the tombstone at 3
    let report = compactor.sweep("compaction").await.unwrap();
    assert_eq!(report.window, SeqRange::new(0, 4));
    assert_eq!(report.scanned, 1);
    assert_eq!(report.reclaimed, 1);
    assert_eq!(store.cleared_count(), 3);

    let stats = compactor.stats();
    assert_eq!(stats.immediate_reclaims, 2);
    assert_eq!(stats.blocks_reclaimed, 1);
}

#[tokio::test]
async fn offline_index_under_each_lookup_mode() {
    let setup = || async {
        let store = Arc::new(MemoryStore::new());
        put(&store, "a", "1").await;
        put(&store, "a", "2").await;
        put(&store, "b", "1").await;
        store.set_index_online(false);
        store
    };

    let blocking = Compactor::with_config(
        setup().await,
        CompactionConfig::builder()
            .lookup_mode(LookupMode::Blocking)
            .build(),
    );
    assert!(blocking.sweep("c").await.is_err());
    assert_eq!(blocking.store().cleared_count(), 0);
    assert_eq!(blocking.stats().sweeps_failed, 1);

    let non_blocking = Compactor::new(setup().await);
    let report = non_blocking.sweep("c").await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.checkpoint, Some(Checkpoint::at(3)));
}
