//! Unit tests for the chunk comparator.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::{
    compare_chunk, compare_pages, Action, ChunkDiff, CompareOpts, DuplicatePolicy, Ignored, Key,
    KeyLookup, KeyPath, MemoryFeed, Page, PageReader, Record, Side, SyncError, ValidationError,
};

fn ids(keys: &[i64]) -> Vec<Value> {
    keys.iter().map(|k| json!({ "id": k })).collect()
}

fn keys_of(items: &[Value]) -> Vec<i64> {
    items.iter().map(|v| v["id"].as_i64().unwrap()).collect()
}

fn opts(chunk_size: usize) -> CompareOpts<Value> {
    CompareOpts::new("id").unwrap().with_chunk_size(chunk_size)
}

fn update_keys(diff: &ChunkDiff<Value>) -> Vec<Key> {
    diff.update.iter().map(|u| u.source_key.clone()).collect()
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_compare_with_duplicates_ignored() {
    let source = ids(&[0, 1, 1, 2, 3, 4, 4, 8, 9, 9]);
    let dest = ids(&[2, 4, 5, 6, 70]);

    let diff = compare_chunk(
        &opts(2).with_duplicates(DuplicatePolicy::Both),
        source,
        dest,
    )
    .unwrap();

    assert_eq!(keys_of(&diff.remove), vec![5, 6]);
    assert_eq!(keys_of(&diff.create), vec![0, 1, 3, 8, 9]);
    assert_eq!(update_keys(&diff), vec![Key::Int(2), Key::Int(4)]);
    assert!(diff.next_source.is_empty());
    assert_eq!(keys_of(&diff.next_dest), vec![70]);
    assert_eq!(
        diff.ignore,
        vec![
            Ignored::source(Key::Int(1)),
            Ignored::source(Key::Int(4)),
            Ignored::source(Key::Int(9)),
        ]
    );

    let first = &diff.update[0];
    assert_eq!(first.source, json!({"id": 2}));
    assert_eq!(first.dest, json!({"id": 2}));
    assert_eq!(first.dest_key, Key::Int(2));
}

#[test]
fn test_chunk_actions_follow_dispatch_order() {
    let diff = compare_chunk(
        &opts(2).with_duplicates(DuplicatePolicy::Both),
        ids(&[0, 1, 1, 2, 3, 4, 4, 8, 9, 9]),
        ids(&[2, 4, 5, 6, 70]),
    )
    .unwrap();
    assert!(diff.has_carry_over());

    let trace: Vec<String> = diff
        .into_actions()
        .iter()
        .map(|action| match action {
            Action::Update(update) => format!("update {}", update.source_key),
            Action::Create { item } => format!("create {}", item["id"]),
            Action::Remove { item } => format!("remove {}", item["id"]),
            Action::Ignore(ignored) => format!("ignore {} {}", ignored.side, ignored.key),
        })
        .collect();

    assert_eq!(
        trace,
        vec![
            "update 2",
            "update 4",
            "create 0",
            "create 1",
            "create 3",
            "create 8",
            "create 9",
            "remove 5",
            "remove 6",
            "ignore source 1",
            "ignore source 4",
            "ignore source 9",
        ]
    );
}

#[test]
fn test_compare_large_unsigned_keys() {
    let source = vec![
        json!({"id": 18446744073709551614u64}),
        json!({"id": 18446744073709551615u64}),
    ];

    let diff = compare_chunk(&opts(0), source, Vec::new()).unwrap();

    assert_eq!(diff.create.len(), 2);
    assert!(diff.ignore.is_empty());
    assert_eq!(diff.create[1]["id"].as_u64(), Some(u64::MAX));
}

#[test]
fn test_compare_rejects_unpoliced_duplicates() {
    let err = compare_chunk(&opts(2), ids(&[0, 1, 1, 2]), ids(&[2, 4])).unwrap_err();

    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Duplicate source key \"1\"");
}

#[test]
fn test_compare_duplicate_policy_is_per_side() {
    let source_only = opts(0).with_duplicates(DuplicatePolicy::Source);

    assert!(compare_chunk(&source_only, ids(&[1, 1]), ids(&[1])).is_ok());
    let err = compare_chunk(&source_only, ids(&[1]), ids(&[1, 1])).unwrap_err();
    assert!(matches!(
        err,
        SyncError::DuplicateKey {
            side: Side::Dest,
            ..
        }
    ));
}

#[test]
fn test_compare_carries_source_beyond_unfinished_dest() {
    // dest page is full, so a later dest page may still hold 7 and 8
    let diff = compare_chunk(&opts(2), ids(&[1, 7, 8]), ids(&[1, 3])).unwrap();

    assert_eq!(update_keys(&diff), vec![Key::Int(1)]);
    assert_eq!(keys_of(&diff.remove), vec![3]);
    assert_eq!(keys_of(&diff.next_source), vec![7, 8]);
    assert!(diff.create.is_empty());
}

#[test]
fn test_compare_creates_beyond_final_dest() {
    let diff = compare_chunk(&opts(5), ids(&[1, 7, 8]), ids(&[1, 3])).unwrap();

    assert_eq!(keys_of(&diff.create), vec![7, 8]);
    assert!(diff.next_source.is_empty());
}

#[test]
fn test_compare_removes_below_source_range() {
    let diff = compare_chunk(&opts(2), ids(&[5, 6]), ids(&[1, 2])).unwrap();

    assert_eq!(keys_of(&diff.remove), vec![1, 2]);
    assert_eq!(keys_of(&diff.next_source), vec![5, 6]);
}

#[test]
fn test_compare_empty_pages() {
    let diff = compare_chunk(&opts(3), Vec::new(), ids(&[1, 2])).unwrap();
    assert_eq!(keys_of(&diff.remove), vec![1, 2]);

    let diff = compare_chunk(&opts(3), ids(&[1, 2]), Vec::new()).unwrap();
    assert_eq!(keys_of(&diff.create), vec![1, 2]);

    let diff = compare_chunk(&opts(3), Vec::new(), Vec::new()).unwrap();
    assert_eq!(diff, ChunkDiff::default());
}

#[test]
fn test_compare_pages_uses_explicit_finality() {
    // carry-over plus a short page: three items at chunk size 2 would look
    // unfinished to compare_chunk
    let diff = compare_pages(
        &opts(2),
        Page::new(ids(&[1, 2, 3]), true),
        Page::new(ids(&[1, 9]), false),
    )
    .unwrap();

    assert_eq!(keys_of(&diff.create), vec![2, 3]);
    assert_eq!(keys_of(&diff.remove), vec![9]);
    assert!(!diff.has_carry_over());

    let derived = compare_chunk(&opts(2), ids(&[1, 2, 3]), ids(&[1, 9])).unwrap();

    assert_eq!(keys_of(&derived.create), vec![2, 3]);
    assert_eq!(keys_of(&derived.next_dest), vec![9]);
    assert!(derived.remove.is_empty());
}

// ============================================================================
// Update decision
// ============================================================================

#[test]
fn test_compare_identical_feeds() {
    let feed = ids(&[1, 2, 3, 4]);

    let diff = compare_chunk(&opts(0), feed.clone(), feed.clone()).unwrap();
    assert!(diff.create.is_empty());
    assert!(diff.remove.is_empty());
    assert_eq!(diff.update.len(), 4);

    // rejected pairs are dropped without an ignore record
    let never = opts(0).with_decide_update(|_, _| false);
    let diff = compare_chunk(&never, feed.clone(), feed).unwrap();
    assert!(diff.update.is_empty());
    assert!(diff.ignore.is_empty());
    assert!(diff.create.is_empty());
    assert!(diff.remove.is_empty());
}

#[test]
fn test_compare_decide_update_sees_both_records() {
    let source = vec![json!({"id": 1, "v": "a"}), json!({"id": 2, "v": "b"})];
    let dest = vec![json!({"id": 1, "v": "a"}), json!({"id": 2, "v": "x"})];

    let changed = opts(0).with_decide_update(|s: &Value, d: &Value| s != d);
    let diff = compare_chunk(&changed, source, dest).unwrap();

    assert_eq!(update_keys(&diff), vec![Key::Int(2)]);
    assert_eq!(diff.update[0].dest["v"], "x");
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_compare_rejects_descending_keys() {
    let err = compare_chunk(&opts(0), ids(&[1, 3, 2]), ids(&[1])).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Bad source sort, \"2\" should be greater than \"3\""
    );

    let err = compare_chunk(&opts(0), ids(&[1]), ids(&[5, 4])).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::BadSort {
            side: Side::Dest,
            ..
        })
    ));
}

#[test]
fn test_compare_rejects_mixed_key_kinds() {
    let source = vec![json!({"id": 1}), json!({"id": "2"})];
    let err = compare_chunk(&opts(0), source, ids(&[1])).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Bad source key type, \"1\" (number) should be same type as \"2\" (string)"
    );

    let source = vec![json!({"id": "a"})];
    let err = compare_chunk(&opts(0), source, ids(&[1])).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::SideKindMismatch { .. })
    ));
}

#[test]
fn test_compare_rejects_unorderable_key() {
    let source = vec![json!({"id": {"nested": true}})];
    let err = compare_chunk(&opts(0), source, ids(&[1])).unwrap_err();

    match err {
        SyncError::Validation(ValidationError::BadKeyType { side, kind, .. }) => {
            assert_eq!(side, Side::Source);
            assert_eq!(kind, "object");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_compare_missing_key() {
    let source = vec![json!({"id": 1}), json!({"name": "no key"}), json!({"id": 3})];

    let err = compare_chunk(&opts(0), source.clone(), ids(&[1, 3])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing source key 'id' on item index 1"
    );

    let diff = compare_chunk(
        &opts(0).with_ignore_undefined(true),
        source,
        ids(&[1, 3]),
    )
    .unwrap();
    assert_eq!(update_keys(&diff), vec![Key::Int(1), Key::Int(3)]);
    assert!(diff.create.is_empty());
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_compare_different_key_paths() {
    let source = vec![json!({"code": "a"}), json!({"code": "c"})];
    let dest = vec![json!({"meta": {"ref": "a"}}), json!({"meta": {"ref": "b"}})];

    let opts = CompareOpts::new("code")
        .unwrap()
        .with_dest_key("meta.ref")
        .unwrap();
    let diff = compare_chunk(&opts, source, dest).unwrap();

    assert_eq!(diff.update.len(), 1);
    assert_eq!(diff.update[0].dest_key, Key::from("a"));
    assert_eq!(diff.create, vec![json!({"code": "c"})]);
    assert_eq!(diff.remove, vec![json!({"meta": {"ref": "b"}})]);
}

#[derive(Debug, Clone, PartialEq)]
struct Event {
    at: chrono::DateTime<Utc>,
}

impl Record for Event {
    fn lookup_key(&self, _path: &KeyPath) -> KeyLookup {
        KeyLookup::Found(Key::Date(self.at))
    }
}

#[test]
fn test_compare_date_keys() {
    let day = |d: u32| Event {
        at: Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap(),
    };

    let opts = CompareOpts::new("at").unwrap();
    let diff = compare_chunk(&opts, vec![day(1), day(3)], vec![day(2), day(3)]).unwrap();

    assert_eq!(diff.create, vec![day(1)]);
    assert_eq!(diff.remove, vec![day(2)]);
    assert_eq!(diff.update.len(), 1);
}

#[test]
fn test_partition_is_complete() {
    let source = ids(&[1, 3, 5, 7, 9, 11]);
    let dest = ids(&[2, 3, 4, 9, 10, 12, 14]);
    let (source_len, dest_len) = (source.len(), dest.len());

    let diff = compare_chunk(&opts(6), source, dest).unwrap();

    assert_eq!(
        diff.create.len() + diff.update.len() + diff.next_source.len() + diff.ignore.len(),
        source_len
    );
    assert_eq!(
        diff.remove.len() + diff.update.len() + diff.next_dest.len(),
        dest_len
    );
}

// ============================================================================
// MemoryFeed
// ============================================================================

#[tokio::test]
async fn test_memory_feed_pages() {
    let mut feed = MemoryFeed::new(vec![1, 2, 3, 4, 5], 2);

    assert_eq!(feed.read_page(0).await.unwrap(), vec![1, 2]);
    assert_eq!(feed.read_page(2).await.unwrap(), vec![5]);
    assert!(feed.read_page(3).await.unwrap().is_empty());

    let mut whole = MemoryFeed::new(vec![1, 2, 3], 0);
    assert_eq!(whole.read_page(0).await.unwrap(), vec![1, 2, 3]);
    assert!(whole.read_page(1).await.unwrap().is_empty());
}

#[test]
fn test_duplicate_policy_parse() {
    assert_eq!("both".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Both);
    assert_eq!("true".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Both);
    assert_eq!(
        "destination".parse::<DuplicatePolicy>().unwrap(),
        DuplicatePolicy::Dest
    );
    assert_eq!("none".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
    assert!("sometimes".parse::<DuplicatePolicy>().is_err());
}
