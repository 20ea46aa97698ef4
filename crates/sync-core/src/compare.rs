//! Chunk comparator.
//!
//! Classifies one source page against one destination page, both sorted
//! ascending by key, into definite removals, creations and update pairs, plus
//! carry-over for items that cannot be decided until the other feed shows
//! more of its range.
//!
//! The comparison runs in three passes:
//!
//! 1. Resolve every key and validate adjacent pairs (kind, order, duplicates).
//! 2. Partition each side against the other side's visible key range.
//! 3. Merge-walk the in-range candidates of both sides (see `walk.rs`).

use crate::error::{SyncError, ValidationError};
use crate::key::{check_adjacent, Key, KeyLookup, KeyPath, Record};
use crate::types::{ChunkDiff, DuplicatePolicy, Ignored, Side};
use crate::walk::MergeWalk;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decides whether a matched (source, destination) pair becomes an update.
pub type DecideUpdate<R> = Arc<dyn Fn(&R, &R) -> bool + Send + Sync>;

/// Options for comparing page pairs.
pub struct CompareOpts<R> {
    /// Key path read from source records.
    pub source_key: KeyPath,

    /// Key path read from destination records.
    pub dest_key: KeyPath,

    /// Page size of both feeds. A page shorter than this is the final page;
    /// `0` means every page is final (single unchunked pass).
    pub chunk_size: usize,

    /// Which sides may carry duplicate adjacent keys.
    pub duplicates: DuplicatePolicy,

    /// Skip records without a key instead of failing.
    pub ignore_undefined: bool,

    /// Update decision for matched pairs (default: always update).
    pub decide_update: DecideUpdate<R>,
}

impl<R> Clone for CompareOpts<R> {
    fn clone(&self) -> Self {
        Self {
            source_key: self.source_key.clone(),
            dest_key: self.dest_key.clone(),
            chunk_size: self.chunk_size,
            duplicates: self.duplicates,
            ignore_undefined: self.ignore_undefined,
            decide_update: Arc::clone(&self.decide_update),
        }
    }
}

impl<R> std::fmt::Debug for CompareOpts<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareOpts")
            .field("source_key", &self.source_key)
            .field("dest_key", &self.dest_key)
            .field("chunk_size", &self.chunk_size)
            .field("duplicates", &self.duplicates)
            .field("ignore_undefined", &self.ignore_undefined)
            .finish_non_exhaustive()
    }
}

impl<R> CompareOpts<R> {
    /// Options matching both sides on the same key path.
    pub fn new(key: &str) -> Result<Self, SyncError> {
        let key = KeyPath::parse(key)?;
        Ok(Self {
            source_key: key.clone(),
            dest_key: key,
            chunk_size: 0,
            duplicates: DuplicatePolicy::Reject,
            ignore_undefined: false,
            decide_update: Arc::new(|_, _| true),
        })
    }

    /// Use a different key path on the source side.
    pub fn with_source_key(mut self, key: &str) -> Result<Self, SyncError> {
        self.source_key = KeyPath::parse(key)?;
        Ok(self)
    }

    /// Use a different key path on the destination side.
    pub fn with_dest_key(mut self, key: &str) -> Result<Self, SyncError> {
        self.dest_key = KeyPath::parse(key)?;
        Ok(self)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn with_ignore_undefined(mut self, ignore: bool) -> Self {
        self.ignore_undefined = ignore;
        self
    }

    pub fn with_decide_update<F>(mut self, decide: F) -> Self
    where
        F: Fn(&R, &R) -> bool + Send + Sync + 'static,
    {
        self.decide_update = Arc::new(decide);
        self
    }

    /// Whether a page of `len` items read from a feed is its last page.
    pub fn is_final_len(&self, len: usize) -> bool {
        self.chunk_size == 0 || len < self.chunk_size
    }

    fn key_path(&self, side: Side) -> &KeyPath {
        match side {
            Side::Source => &self.source_key,
            Side::Dest => &self.dest_key,
        }
    }
}

/// Records offered to one comparison for one side.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// No further page follows on this feed.
    pub is_final: bool,
}

impl<R> Page<R> {
    pub fn new(items: Vec<R>, is_final: bool) -> Self {
        Self { items, is_final }
    }
}

/// A record together with its resolved key.
#[derive(Debug)]
pub(crate) struct Keyed<R> {
    pub key: Key,
    pub item: R,
}

/// Where a key falls relative to the other side's visible range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Below,
    Within,
    Above,
}

struct KeyRange {
    min: Key,
    max: Key,
}

impl KeyRange {
    fn of<R>(items: &[Keyed<R>]) -> Option<Self> {
        match (items.first(), items.last()) {
            (Some(first), Some(last)) => Some(Self {
                min: first.key.clone(),
                max: last.key.clone(),
            }),
            _ => None,
        }
    }

    /// An absent range (empty page) places everything above it.
    fn zone(range: Option<&Self>, key: &Key) -> Zone {
        match range {
            None => Zone::Above,
            Some(r) if key.cmp(&r.min) == Ordering::Less => Zone::Below,
            Some(r) if key.cmp(&r.max) == Ordering::Greater => Zone::Above,
            Some(_) => Zone::Within,
        }
    }
}

/// Compare one source page against one destination page, deriving each
/// side's finality from `opts.chunk_size`.
pub fn compare_chunk<R: Record>(
    opts: &CompareOpts<R>,
    source: Vec<R>,
    dest: Vec<R>,
) -> Result<ChunkDiff<R>, SyncError> {
    let source_final = opts.is_final_len(source.len());
    let dest_final = opts.is_final_len(dest.len());
    compare_pages(
        opts,
        Page::new(source, source_final),
        Page::new(dest, dest_final),
    )
}

/// Compare one source page against one destination page with explicit
/// finality.
///
/// Either a complete classification is returned or an error; never a
/// partial result.
pub fn compare_pages<R: Record>(
    opts: &CompareOpts<R>,
    source: Page<R>,
    dest: Page<R>,
) -> Result<ChunkDiff<R>, SyncError> {
    let source_final = source.is_final;
    let dest_final = dest.is_final;

    let source = resolve_keys(opts, Side::Source, source.items)?;
    let dest = resolve_keys(opts, Side::Dest, dest.items)?;

    let source_range = KeyRange::of(&source);
    let dest_range = KeyRange::of(&dest);

    if let (Some(s), Some(d)) = (&source_range, &dest_range) {
        if s.min.kind() != d.min.kind() {
            return Err(ValidationError::SideKindMismatch {
                source_kind: s.min.kind().to_string(),
                dest_kind: d.min.kind().to_string(),
            }
            .into());
        }
    }

    debug!(
        source_len = source.len(),
        dest_len = dest.len(),
        source_final,
        dest_final,
        "Comparing chunk"
    );

    let mut diff = ChunkDiff::default();
    let mut create_after = Vec::new();

    let source_candidates = partition_source(
        source,
        dest_range.as_ref(),
        dest_final,
        &mut diff,
        &mut create_after,
    );
    let dest_candidates = partition_dest(dest, source_range.as_ref(), source_final, &mut diff);

    MergeWalk::new(source_candidates, dest_candidates).run(&opts.decide_update, &mut diff);

    diff.create.append(&mut create_after);

    debug!(
        remove = diff.remove.len(),
        create = diff.create.len(),
        update = diff.update.len(),
        ignore = diff.ignore.len(),
        next_source = diff.next_source.len(),
        next_dest = diff.next_dest.len(),
        "Chunk compared"
    );

    Ok(diff)
}

/// Resolve every key on one side and validate each adjacent pair.
fn resolve_keys<R: Record>(
    opts: &CompareOpts<R>,
    side: Side,
    items: Vec<R>,
) -> Result<Vec<Keyed<R>>, SyncError> {
    let path = opts.key_path(side);
    let mut keyed: Vec<Keyed<R>> = Vec::with_capacity(items.len());

    for (position, item) in items.into_iter().enumerate() {
        let key = match item.lookup_key(path) {
            KeyLookup::Found(key) if key.is_orderable() => key,
            KeyLookup::Found(key) => {
                return Err(ValidationError::BadKeyType {
                    side,
                    repr: key.to_string(),
                    kind: "NaN".to_string(),
                }
                .into())
            }
            KeyLookup::Unsupported { kind, repr } => {
                return Err(ValidationError::BadKeyType { side, repr, kind }.into())
            }
            KeyLookup::Missing if opts.ignore_undefined => {
                trace!(%side, position, "Skipping item without key '{path}'");
                continue;
            }
            KeyLookup::Missing => {
                return Err(ValidationError::MissingKey {
                    side,
                    path: path.to_string(),
                    position,
                }
                .into())
            }
        };

        if let Some(prev) = keyed.last() {
            check_adjacent(side, &prev.key, &key, opts.duplicates)?;
        }
        keyed.push(Keyed { key, item });
    }

    Ok(keyed)
}

/// Split source items against the destination range.
///
/// Below the range: create. Above it: create when the destination is final,
/// otherwise carry. Within: merge-walk candidate. Duplicate runs in the create
/// zones collapse to their last item.
fn partition_source<R>(
    items: Vec<Keyed<R>>,
    dest_range: Option<&KeyRange>,
    dest_final: bool,
    diff: &mut ChunkDiff<R>,
    create_after: &mut Vec<R>,
) -> Vec<Keyed<R>> {
    let mut candidates = Vec::new();
    let mut items = items.into_iter().peekable();

    while let Some(current) = items.next() {
        let zone = KeyRange::zone(dest_range, &current.key);
        match zone {
            Zone::Within => candidates.push(current),
            Zone::Above if !dest_final => diff.next_source.push(current.item),
            Zone::Below | Zone::Above => {
                if items.peek().is_some_and(|next| next.key == current.key) {
                    diff.ignore.push(Ignored::source(current.key));
                } else if zone == Zone::Below {
                    diff.create.push(current.item);
                } else {
                    create_after.push(current.item);
                }
            }
        }
    }

    candidates
}

/// Split destination items against the source range.
///
/// Below the range: remove (earlier source pages already covered it). Above
/// it: remove when the source is final, otherwise carry. Within: merge-walk
/// candidate.
fn partition_dest<R>(
    items: Vec<Keyed<R>>,
    source_range: Option<&KeyRange>,
    source_final: bool,
    diff: &mut ChunkDiff<R>,
) -> Vec<Keyed<R>> {
    let mut candidates = Vec::new();

    for current in items {
        match KeyRange::zone(source_range, &current.key) {
            Zone::Within => candidates.push(current),
            Zone::Above if !source_final => diff.next_dest.push(current.item),
            Zone::Below | Zone::Above => diff.remove.push(current.item),
        }
    }

    candidates
}
