//! Boundary resolver: merge walk over the in-range candidates of a chunk.
//!
//! Two cursors, one per side, each holding a current item and a lookahead.
//! Every iteration selects one [`Step`] from the cursor state and applies it.

use crate::compare::{DecideUpdate, Keyed};
use crate::key::Key;
use crate::types::{ChunkDiff, Ignored, Update};
use std::cmp::Ordering;
use tracing::trace;

/// Transition taken by one iteration of the merge walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Current source key repeats: ignore it, keep the destination item.
    AdvanceSource,
    /// Current destination key repeats: ignore it, keep the source item.
    AdvanceDest,
    /// Keys match: decide the update and move both cursors.
    AdvanceBoth,
    /// Source is ahead: remove every destination item below the source key.
    OvershootDest,
    /// Destination is ahead: create every source item below the destination key.
    OvershootSource,
    /// Destination exhausted: create the remaining source items.
    DrainSource,
    /// Source exhausted: remove the remaining destination items.
    DrainDest,
    Finished,
}

struct Cursor<R> {
    current: Option<Keyed<R>>,
    rest: std::vec::IntoIter<Keyed<R>>,
}

impl<R> Cursor<R> {
    fn new(items: Vec<Keyed<R>>) -> Self {
        let mut rest = items.into_iter();
        Self {
            current: rest.next(),
            rest,
        }
    }

    fn key(&self) -> Option<&Key> {
        self.current.as_ref().map(|k| &k.key)
    }

    /// The current key is repeated by the next item.
    fn is_duplicate(&self) -> bool {
        match (self.key(), self.rest.as_slice().first()) {
            (Some(key), Some(next)) => *key == next.key,
            _ => false,
        }
    }

    fn take(&mut self) -> Option<Keyed<R>> {
        std::mem::replace(&mut self.current, self.rest.next())
    }
}

pub(crate) struct MergeWalk<R> {
    source: Cursor<R>,
    dest: Cursor<R>,
}

impl<R> MergeWalk<R> {
    pub(crate) fn new(source: Vec<Keyed<R>>, dest: Vec<Keyed<R>>) -> Self {
        Self {
            source: Cursor::new(source),
            dest: Cursor::new(dest),
        }
    }

    /// Select the next transition from the cursor state alone.
    pub(crate) fn step(&self) -> Step {
        if self.source.is_duplicate() {
            return Step::AdvanceSource;
        }
        if self.dest.is_duplicate() {
            return Step::AdvanceDest;
        }
        match (self.source.key(), self.dest.key()) {
            (None, None) => Step::Finished,
            (Some(_), None) => Step::DrainSource,
            (None, Some(_)) => Step::DrainDest,
            (Some(s), Some(d)) => match s.cmp(d) {
                Ordering::Equal => Step::AdvanceBoth,
                Ordering::Greater => Step::OvershootDest,
                Ordering::Less => Step::OvershootSource,
            },
        }
    }

    pub(crate) fn run(mut self, decide_update: &DecideUpdate<R>, diff: &mut ChunkDiff<R>) {
        loop {
            let step = self.step();
            trace!(?step, source = ?self.source.key(), dest = ?self.dest.key(), "Merge walk step");
            if step == Step::Finished {
                return;
            }
            self.apply(step, decide_update, diff);
        }
    }

    fn apply(&mut self, step: Step, decide_update: &DecideUpdate<R>, diff: &mut ChunkDiff<R>) {
        match step {
            Step::AdvanceSource => {
                if let Some(dup) = self.source.take() {
                    diff.ignore.push(Ignored::source(dup.key));
                }
            }
            Step::AdvanceDest => {
                if let Some(dup) = self.dest.take() {
                    diff.ignore.push(Ignored::dest(dup.key));
                }
            }
            Step::AdvanceBoth => {
                if let (Some(source), Some(dest)) = (self.source.take(), self.dest.take()) {
                    // A rejected pair is dropped without any record.
                    if decide_update(&source.item, &dest.item) {
                        diff.update.push(Update {
                            source_key: source.key,
                            source: source.item,
                            dest_key: dest.key,
                            dest: dest.item,
                        });
                    }
                }
            }
            Step::OvershootDest => {
                let Some(bound) = self.source.key().cloned() else {
                    return;
                };
                self.remove_below(Some(&bound), diff);
            }
            Step::OvershootSource => {
                let Some(bound) = self.dest.key().cloned() else {
                    return;
                };
                self.create_below(Some(&bound), diff);
            }
            Step::DrainSource => self.create_below(None, diff),
            Step::DrainDest => self.remove_below(None, diff),
            Step::Finished => {}
        }
    }

    /// Remove destination items strictly below `bound` (all when `None`).
    /// Destination duplicates inside the scan are all removed.
    fn remove_below(&mut self, bound: Option<&Key>, diff: &mut ChunkDiff<R>) {
        while let Some(key) = self.dest.key() {
            if bound.is_some_and(|b| key >= b) {
                break;
            }
            if let Some(dest) = self.dest.take() {
                diff.remove.push(dest.item);
            }
        }
    }

    /// Create source items strictly below `bound` (all when `None`), collapsing
    /// duplicate runs to their last item.
    fn create_below(&mut self, bound: Option<&Key>, diff: &mut ChunkDiff<R>) {
        while let Some(key) = self.source.key() {
            if bound.is_some_and(|b| key >= b) {
                break;
            }
            let duplicate = self.source.is_duplicate();
            if let Some(source) = self.source.take() {
                if duplicate {
                    diff.ignore.push(Ignored::source(source.key));
                } else {
                    diff.create.push(source.item);
                }
            }
        }
    }
}
