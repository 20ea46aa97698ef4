//! Chunked grouping of a single sorted feed
//!
//! Buckets consecutive records sharing a key into groups, page by page. The
//! last group of a non-final page may continue on the next page, so it is
//! carried over instead of being emitted.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use sync_core::{
    check_adjacent, DuplicatePolicy, Key, KeyLookup, KeyPath, PageReader, Record, Side, SyncError,
    ValidationError,
};
use tracing::{debug, info, trace, warn};

/// Decides whether a record repeating the previous key joins the open group.
pub type DecideGroup<R> = Arc<dyn Fn(&R, &[R]) -> bool + Send + Sync>;

/// Records sharing one key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group<R> {
    pub key: Key,
    pub items: Vec<R>,
}

/// Result of grouping one page
#[derive(Debug)]
pub struct GroupedChunk<R> {
    /// Groups closed by this page, in key order
    pub groups: Vec<Group<R>>,

    /// The open group at the end of a non-final page
    pub carry: Option<Group<R>>,
}

/// Configuration for grouping a feed
pub struct GroupConfig<R> {
    /// Key path read from every record
    pub key: KeyPath,

    /// Page size of the feed; `0` reads the feed as one final page
    pub chunk_size: usize,

    /// Skip records without a key instead of failing
    pub ignore_undefined: bool,

    /// Dispatch closed groups after every page (default) or only at the end
    pub continuous: bool,

    pub decide_group: DecideGroup<R>,
}

impl<R> GroupConfig<R> {
    pub fn new(key: &str) -> Result<Self, SyncError> {
        Ok(Self {
            key: KeyPath::parse(key)?,
            chunk_size: 0,
            ignore_undefined: false,
            continuous: true,
            decide_group: Arc::new(|_, _| true),
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_ignore_undefined(mut self, ignore: bool) -> Self {
        self.ignore_undefined = ignore;
        self
    }

    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_decide_group<F>(mut self, decide: F) -> Self
    where
        F: Fn(&R, &[R]) -> bool + Send + Sync + 'static,
    {
        self.decide_group = Arc::new(decide);
        self
    }

    fn is_final_len(&self, len: usize) -> bool {
        self.chunk_size == 0 || len < self.chunk_size
    }
}

/// Group one sorted page, continuing the group carried from the previous page.
///
/// A record repeating the previous key joins the open group only when
/// `decide_group` accepts it; the first record of a group always joins. On a
/// non-final page the last group is returned as carry-over.
pub fn group_chunk<R: Record>(
    config: &GroupConfig<R>,
    items: Vec<R>,
    carry: Option<Group<R>>,
    is_final: bool,
) -> Result<GroupedChunk<R>, SyncError> {
    let mut groups = Vec::new();
    let mut open = carry;

    for (position, item) in items.into_iter().enumerate() {
        let key = match item.lookup_key(&config.key) {
            KeyLookup::Found(key) if key.is_orderable() => key,
            KeyLookup::Found(key) => {
                return Err(ValidationError::BadKeyType {
                    side: Side::Source,
                    repr: key.to_string(),
                    kind: "NaN".to_string(),
                }
                .into())
            }
            KeyLookup::Unsupported { kind, repr } => {
                return Err(ValidationError::BadKeyType {
                    side: Side::Source,
                    repr,
                    kind,
                }
                .into())
            }
            KeyLookup::Missing if config.ignore_undefined => {
                trace!(position, "Skipping item without key '{}'", config.key);
                continue;
            }
            KeyLookup::Missing => {
                return Err(ValidationError::MissingKey {
                    side: Side::Source,
                    path: config.key.to_string(),
                    position,
                }
                .into())
            }
        };

        match open.as_mut() {
            Some(group) if group.key == key => {
                if (config.decide_group)(&item, &group.items) {
                    group.items.push(item);
                }
            }
            Some(group) => {
                check_adjacent(Side::Source, &group.key, &key, DuplicatePolicy::Both)?;
                groups.extend(open.replace(Group {
                    key,
                    items: vec![item],
                }));
            }
            None => {
                open = Some(Group {
                    key,
                    items: vec![item],
                });
            }
        }
    }

    if is_final {
        groups.extend(open.take());
    }

    Ok(GroupedChunk {
        groups,
        carry: open,
    })
}

/// Receives the groups a grouping run produces.
#[async_trait]
pub trait GroupSink<R: Send + 'static>: Send {
    async fn on_group(&mut self, group: Group<R>) -> anyhow::Result<()>;

    /// Called once when the run aborts, before the error is returned.
    fn on_error(&mut self, _error: &SyncError) {}
}

#[async_trait]
impl<R: Send + 'static> GroupSink<R> for Vec<Group<R>> {
    async fn on_group(&mut self, group: Group<R>) -> anyhow::Result<()> {
        self.push(group);
        Ok(())
    }
}

/// Summary of a grouping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupSummary {
    /// Records read from the feed
    pub source: usize,

    /// Groups dispatched to the sink
    pub grouped: usize,
}

/// Group a sorted feed and dispatch every group to `sink`.
pub async fn group<R, P, K>(
    config: &GroupConfig<R>,
    reader: &mut P,
    sink: &mut K,
) -> Result<GroupSummary, SyncError>
where
    R: Record + Send + 'static,
    P: PageReader<R> + ?Sized,
    K: GroupSink<R> + ?Sized,
{
    info!(
        "Starting grouping by '{}' (chunk size {})",
        config.key, config.chunk_size
    );

    let result = run_group(config, reader, sink).await;
    match result {
        Ok(summary) => {
            info!(
                "Grouping completed: {} records in {} groups",
                summary.source, summary.grouped
            );
            Ok(summary)
        }
        Err(err) => {
            warn!("Grouping aborted: {err}");
            sink.on_error(&err);
            Err(err)
        }
    }
}

async fn run_group<R, P, K>(
    config: &GroupConfig<R>,
    reader: &mut P,
    sink: &mut K,
) -> Result<GroupSummary, SyncError>
where
    R: Record + Send + 'static,
    P: PageReader<R> + ?Sized,
    K: GroupSink<R> + ?Sized,
{
    let mut summary = GroupSummary::default();
    let mut pending: Vec<Group<R>> = Vec::new();
    let mut carry = None;
    let mut page = 0;

    loop {
        let items = reader
            .read_page(page)
            .await
            .map_err(|source| SyncError::Read {
                side: Side::Source,
                page,
                source,
            })?;

        let is_final = config.is_final_len(items.len());
        summary.source += items.len();
        debug!("Read page {page}: {} items (final {is_final})", items.len());

        let chunk = group_chunk(config, items, carry, is_final)?;
        carry = chunk.carry;
        pending.extend(chunk.groups);

        if is_final || config.continuous {
            for group in pending.drain(..) {
                let key = group.key.to_string();
                sink.on_group(group)
                    .await
                    .map_err(|source| SyncError::GroupCallback { key, source })?;
                summary.grouped += 1;
            }
        }

        if is_final {
            return Ok(summary);
        }
        page += 1;
    }
}
