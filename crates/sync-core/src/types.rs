//! Value types produced by chunk comparison and synchronization.

use crate::error::SyncError;
use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two feeds being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Dest,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Dest => "destination",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sides may carry duplicate adjacent keys.
///
/// On a permitted side every item of a duplicate run except the last is
/// recorded as [`Ignored`]; on any other side a duplicate aborts the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Source,
    Dest,
    Both,
}

impl DuplicatePolicy {
    /// Whether duplicates are tolerated on `side`.
    pub fn permits(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (DuplicatePolicy::Both, _)
                | (DuplicatePolicy::Source, Side::Source)
                | (DuplicatePolicy::Dest, Side::Dest)
        )
    }
}

impl FromStr for DuplicatePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "reject" | "false" => Ok(DuplicatePolicy::Reject),
            "source" => Ok(DuplicatePolicy::Source),
            "dest" | "destination" => Ok(DuplicatePolicy::Dest),
            "both" | "true" => Ok(DuplicatePolicy::Both),
            other => Err(SyncError::Config(format!(
                "Unknown duplicate policy '{other}', expected none, source, dest or both"
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DuplicatePolicy::Reject => "none",
            DuplicatePolicy::Source => "source",
            DuplicatePolicy::Dest => "dest",
            DuplicatePolicy::Both => "both",
        };
        f.write_str(s)
    }
}

/// A matched pair the update decision accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update<R> {
    pub source_key: Key,
    pub source: R,
    pub dest_key: Key,
    pub dest: R,
}

/// A duplicate key discarded under the duplicate policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ignored {
    pub side: Side,
    pub key: Key,
}

impl Ignored {
    pub fn source(key: Key) -> Self {
        Self {
            side: Side::Source,
            key,
        }
    }

    pub fn dest(key: Key) -> Self {
        Self {
            side: Side::Dest,
            key,
        }
    }
}

/// The kind of mutation an action applies to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Update,
    Create,
    Remove,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Update => "update",
            ActionKind::Create => "create",
            ActionKind::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// A single reconciliation action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action<R> {
    Remove { item: R },
    Create { item: R },
    Update(Update<R>),
    Ignore(Ignored),
}

/// Classification of one source page against one destination page.
///
/// `next_source` and `next_dest` hold the carry-over: items that lie beyond
/// the other side's visible range while that side still has pages to come.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDiff<R> {
    pub remove: Vec<R>,
    pub create: Vec<R>,
    pub update: Vec<Update<R>>,
    pub next_source: Vec<R>,
    pub next_dest: Vec<R>,
    pub ignore: Vec<Ignored>,
}

impl<R> Default for ChunkDiff<R> {
    fn default() -> Self {
        Self {
            remove: Vec::new(),
            create: Vec::new(),
            update: Vec::new(),
            next_source: Vec::new(),
            next_dest: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

impl<R> ChunkDiff<R> {
    /// Whether any carry-over is left for the next round.
    pub fn has_carry_over(&self) -> bool {
        !self.next_source.is_empty() || !self.next_dest.is_empty()
    }

    /// Consume the definite buckets as actions in dispatch order
    /// (update, create, remove), followed by ignore records.
    ///
    /// Carry-over is dropped; callers that need it must take it first.
    pub fn into_actions(self) -> Vec<Action<R>> {
        let mut actions =
            Vec::with_capacity(self.update.len() + self.create.len() + self.remove.len());
        actions.extend(self.update.into_iter().map(Action::Update));
        actions.extend(self.create.into_iter().map(|item| Action::Create { item }));
        actions.extend(self.remove.into_iter().map(|item| Action::Remove { item }));
        actions.extend(self.ignore.into_iter().map(Action::Ignore));
        actions
    }
}

/// Per action kind: dispatch after every round (`true`) or only once both
/// feeds are exhausted (`false`).
///
/// Dispatching removals or creations mid-stream can perturb a live
/// destination feed that is paged by offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    pub continuous_update: bool,
    pub continuous_create: bool,
    pub continuous_remove: bool,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            continuous_update: true,
            continuous_create: true,
            continuous_remove: true,
        }
    }
}

impl FlushPolicy {
    /// Defer every action kind to the end of the run.
    pub fn deferred() -> Self {
        Self {
            continuous_update: false,
            continuous_create: false,
            continuous_remove: false,
        }
    }

    pub fn is_continuous(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Update => self.continuous_update,
            ActionKind::Create => self.continuous_create,
            ActionKind::Remove => self.continuous_remove,
        }
    }
}

/// Counters reported by a completed synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Items read from the source feed.
    pub source: usize,
    /// Items read from the destination feed.
    pub dest: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub ignored: usize,
}
