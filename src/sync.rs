//! Streaming synchronization driver
//!
//! Reads both feeds page by page, feeds every page pair (prefixed with the
//! carry-over of the previous round) to the chunk comparator, and dispatches
//! the resulting actions to an [`ActionSink`].
//!
//! # Rounds
//!
//! 1. Read the next page of every feed that has not yet returned a short page.
//! 2. Prepend that feed's carry-over and compare the pair.
//! 3. Keep the new carry-over; buffer removals, creations and updates.
//! 4. Flush the buffers whose flush policy is continuous, in the order
//!    update, create, remove.
//!
//! Keys are also checked across page boundaries: the first key of a page must
//! follow the last key of the previous page of the same feed. When a side may
//! hold duplicates, the trailing key run of a non-final page is held back to
//! the next round so that a run split across pages collapses as a whole.
//!
//! The run ends once both feeds returned their final page and no carry-over is
//! left. A last flush then dispatches everything still buffered, whatever the
//! flush policy says.
//!
//! Memory stays bounded by the chunk size plus the carry-over and whatever the
//! deferred buffers hold.

use sync_core::{
    check_adjacent, compare_pages, ActionKind, ActionSink, CompareOpts, FlushPolicy, Key,
    KeyLookup, KeyPath, Page, PageReader, Record, Side, SyncError, SyncSummary, Update,
};
use tracing::{debug, info, warn};

/// Configuration for a synchronization run
pub struct Config<R> {
    /// Key paths, chunk size, duplicate policy and update decision
    pub compare: CompareOpts<R>,

    /// Whether each action kind is dispatched after every round or deferred
    /// to the end of the run
    pub flush: FlushPolicy,
}

impl<R> Config<R> {
    pub fn new(compare: CompareOpts<R>) -> Self {
        Self {
            compare,
            flush: FlushPolicy::default(),
        }
    }

    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }
}

/// Synchronize the destination feed with the source feed
///
/// Both readers must serve pages sorted ascending by their key path. Returns
/// the run summary, or the first error met. On error the sink's
/// [`ActionSink::on_error`] is called before returning; actions flushed before
/// the error have already been applied.
///
/// # Arguments
/// * `config` - Comparison options and flush policy
/// * `source` - Feed the destination should match
/// * `dest` - Feed being reconciled
/// * `sink` - Receives update, create and remove actions
pub async fn synchronize<R, S, D, K>(
    config: &Config<R>,
    source: &mut S,
    dest: &mut D,
    sink: &mut K,
) -> Result<SyncSummary, SyncError>
where
    R: Record + Send + 'static,
    S: PageReader<R> + ?Sized,
    D: PageReader<R> + ?Sized,
    K: ActionSink<R> + ?Sized,
{
    info!(
        "Starting synchronization (source key '{}', destination key '{}', chunk size {})",
        config.compare.source_key, config.compare.dest_key, config.compare.chunk_size
    );

    let mut run = SyncRun::new(config);
    let result = run.run(source, dest, sink).await;
    match result {
        Ok(summary) => {
            info!(
                "Synchronization completed: {} source, {} destination, {} created, {} updated, {} removed, {} ignored",
                summary.source,
                summary.dest,
                summary.created,
                summary.updated,
                summary.removed,
                summary.ignored
            );
            Ok(summary)
        }
        Err(err) => {
            warn!("Synchronization aborted after {} rounds: {err}", run.round);
            sink.on_error(&err);
            Err(err)
        }
    }
}

fn orderable_key<R: Record>(item: &R, path: &KeyPath) -> Option<Key> {
    match item.lookup_key(path) {
        KeyLookup::Found(key) if key.is_orderable() => Some(key),
        _ => None,
    }
}

/// Read position and carry-over of one feed
struct Feed<R> {
    side: Side,
    next_page: usize,
    exhausted: bool,
    carry: Vec<R>,
    /// Trailing key run of the last page, kept out of the comparison
    held: Vec<R>,
    /// Last key read from the reader
    last_key: Option<Key>,
}

impl<R: Record> Feed<R> {
    fn new(side: Side) -> Self {
        Self {
            side,
            next_page: 0,
            exhausted: false,
            carry: Vec::new(),
            held: Vec::new(),
            last_key: None,
        }
    }

    fn key_path<'o>(&self, opts: &'o CompareOpts<R>) -> &'o KeyPath {
        match self.side {
            Side::Source => &opts.source_key,
            Side::Dest => &opts.dest_key,
        }
    }

    /// The first key of a page must follow the last key of the previous one.
    fn check_boundary(&mut self, read: &[R], opts: &CompareOpts<R>) -> Result<(), SyncError> {
        let path = self.key_path(opts);

        if let (Some(last), Some(first)) = (
            self.last_key.as_ref(),
            read.iter().find_map(|item| orderable_key(item, path)),
        ) {
            check_adjacent(self.side, last, &first, opts.duplicates)?;
        }
        if let Some(last) = read.iter().rev().find_map(|item| orderable_key(item, path)) {
            self.last_key = Some(last);
        }
        Ok(())
    }

    /// Split off the trailing key run so it is compared with the next page.
    fn hold_trailing_run(&mut self, items: &mut Vec<R>, opts: &CompareOpts<R>) {
        let path = self.key_path(opts);
        let Some(last) = items.iter().rev().find_map(|item| orderable_key(item, path)) else {
            return;
        };

        let mut split = items.len();
        while split > 0 {
            match orderable_key(&items[split - 1], path) {
                Some(key) if key != last => break,
                _ => split -= 1,
            }
        }
        self.held = items.split_off(split);
    }

    /// Take the carry-over of a comparison plus whatever was held back.
    fn absorb(&mut self, next: Vec<R>) {
        self.carry = next;
        self.carry.append(&mut self.held);
    }

    /// Carry-over followed by the next page, if the feed still has one.
    async fn next_page<P: PageReader<R> + ?Sized>(
        &mut self,
        reader: &mut P,
        opts: &CompareOpts<R>,
        seen: &mut usize,
    ) -> Result<Page<R>, SyncError> {
        let mut items = std::mem::take(&mut self.carry);

        if !self.exhausted {
            let page = self.next_page;
            let read = reader
                .read_page(page)
                .await
                .map_err(|source| SyncError::Read {
                    side: self.side,
                    page,
                    source,
                })?;

            self.next_page += 1;
            self.exhausted = opts.is_final_len(read.len());
            *seen += read.len();
            self.check_boundary(&read, opts)?;

            debug!(
                "Read {} page {page}: {} items (carry-over {}, final {})",
                self.side,
                read.len(),
                items.len(),
                self.exhausted
            );
            items.extend(read);

            if !self.exhausted && opts.duplicates.permits(self.side) {
                self.hold_trailing_run(&mut items, opts);
            }
        }

        Ok(Page::new(items, self.exhausted))
    }
}

/// Actions decided but not yet dispatched
struct Pending<R> {
    update: Vec<Update<R>>,
    create: Vec<R>,
    remove: Vec<R>,
}

struct SyncRun<'a, R> {
    config: &'a Config<R>,
    summary: SyncSummary,
    source: Feed<R>,
    dest: Feed<R>,
    pending: Pending<R>,
    round: usize,
}

impl<'a, R: Record + Send + 'static> SyncRun<'a, R> {
    fn new(config: &'a Config<R>) -> Self {
        Self {
            config,
            summary: SyncSummary::default(),
            source: Feed::new(Side::Source),
            dest: Feed::new(Side::Dest),
            pending: Pending {
                update: Vec::new(),
                create: Vec::new(),
                remove: Vec::new(),
            },
            round: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.source.exhausted
            && self.dest.exhausted
            && self.source.carry.is_empty()
            && self.dest.carry.is_empty()
    }

    async fn run<S, D, K>(
        &mut self,
        source: &mut S,
        dest: &mut D,
        sink: &mut K,
    ) -> Result<SyncSummary, SyncError>
    where
        S: PageReader<R> + ?Sized,
        D: PageReader<R> + ?Sized,
        K: ActionSink<R> + ?Sized,
    {
        let config = self.config;
        let opts = &config.compare;

        loop {
            let source_page = self
                .source
                .next_page(source, opts, &mut self.summary.source)
                .await?;
            let dest_page = self
                .dest
                .next_page(dest, opts, &mut self.summary.dest)
                .await?;

            let diff = compare_pages(opts, source_page, dest_page)?;

            self.source.absorb(diff.next_source);
            self.dest.absorb(diff.next_dest);
            self.summary.ignored += diff.ignore.len();
            self.pending.update.extend(diff.update);
            self.pending.create.extend(diff.create);
            self.pending.remove.extend(diff.remove);

            debug!(
                "Round {}: {} updates, {} creates, {} removes pending; carry-over {} source, {} destination",
                self.round,
                self.pending.update.len(),
                self.pending.create.len(),
                self.pending.remove.len(),
                self.source.carry.len(),
                self.dest.carry.len()
            );

            if self.is_complete() {
                self.flush(sink, true).await?;
                return Ok(self.summary);
            }

            self.flush(sink, false).await?;
            self.round += 1;
        }
    }

    /// Dispatch buffered actions in the order update, create, remove.
    ///
    /// A final flush dispatches every buffer; otherwise only the buffers with
    /// a continuous flush policy.
    async fn flush<K: ActionSink<R> + ?Sized>(
        &mut self,
        sink: &mut K,
        final_flush: bool,
    ) -> Result<(), SyncError> {
        let policy = self.config.flush;

        if final_flush || policy.is_continuous(ActionKind::Update) {
            for update in std::mem::take(&mut self.pending.update) {
                sink.on_update(update)
                    .await
                    .map_err(|source| SyncError::Callback {
                        action: ActionKind::Update,
                        source,
                    })?;
                self.summary.updated += 1;
            }
        }

        if final_flush || policy.is_continuous(ActionKind::Create) {
            for item in std::mem::take(&mut self.pending.create) {
                sink.on_create(item)
                    .await
                    .map_err(|source| SyncError::Callback {
                        action: ActionKind::Create,
                        source,
                    })?;
                self.summary.created += 1;
            }
        }

        if final_flush || policy.is_continuous(ActionKind::Remove) {
            for item in std::mem::take(&mut self.pending.remove) {
                sink.on_remove(item)
                    .await
                    .map_err(|source| SyncError::Callback {
                        action: ActionKind::Remove,
                        source,
                    })?;
                self.summary.removed += 1;
            }
        }

        Ok(())
    }
}
