//! CLI argument definitions for the diff and group commands.

use crate::group::GroupConfig;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use sync_core::{CompareOpts, DuplicatePolicy, FlushPolicy, SyncError};

/// Arguments shared by every command that reads a source feed.
#[derive(Args, Clone, Debug)]
pub struct FeedArgs {
    /// Source JSON Lines file, sorted ascending by key
    #[arg(long, env = "CHUNK_SYNC_SOURCE")]
    pub source: PathBuf,

    /// Key path (dotted, e.g. `meta.id`) used to match records
    #[arg(long, env = "CHUNK_SYNC_KEY", default_value = "id")]
    pub key: String,

    /// Records read per page; 0 reads each file in a single pass
    #[arg(long, env = "CHUNK_SYNC_CHUNK_SIZE", default_value = "1000")]
    pub chunk_size: usize,

    /// Skip records without a key instead of failing
    #[arg(long)]
    pub ignore_undefined: bool,
}

/// Arguments for `chunk-sync diff`.
#[derive(Args, Clone, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    /// Destination JSON Lines file, sorted ascending by key
    #[arg(long, env = "CHUNK_SYNC_DEST")]
    pub dest: PathBuf,

    /// Key path for source records (defaults to --key)
    #[arg(long)]
    pub source_key: Option<String>,

    /// Key path for destination records (defaults to --key)
    #[arg(long)]
    pub dest_key: Option<String>,

    /// Sides allowed to hold duplicate keys: none, source, dest or both
    #[arg(long, env = "CHUNK_SYNC_IGNORE_DUPLICATES", default_value = "none")]
    pub ignore_duplicates: DuplicatePolicy,

    /// Update every matched pair, even when both records are equal
    #[arg(long)]
    pub always_update: bool,

    /// Emit creations only after both feeds are exhausted
    #[arg(long)]
    pub deferred_create: bool,

    /// Emit updates only after both feeds are exhausted
    #[arg(long)]
    pub deferred_update: bool,

    /// Emit removals only after both feeds are exhausted
    #[arg(long)]
    pub deferred_remove: bool,

    /// Write actions to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Compute actions and the summary without writing any action
    #[arg(long)]
    pub dry_run: bool,
}

impl DiffArgs {
    pub fn compare_opts(&self) -> Result<CompareOpts<Value>, SyncError> {
        let source_key = self.source_key.as_deref().unwrap_or(&self.feed.key);
        let dest_key = self.dest_key.as_deref().unwrap_or(&self.feed.key);

        let mut opts = CompareOpts::new(&self.feed.key)?
            .with_source_key(source_key)?
            .with_dest_key(dest_key)?
            .with_chunk_size(self.feed.chunk_size)
            .with_duplicates(self.ignore_duplicates)
            .with_ignore_undefined(self.feed.ignore_undefined);

        if !self.always_update {
            opts = opts.with_decide_update(|source: &Value, dest: &Value| source != dest);
        }
        Ok(opts)
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            continuous_update: !self.deferred_update,
            continuous_create: !self.deferred_create,
            continuous_remove: !self.deferred_remove,
        }
    }
}

/// Arguments for `chunk-sync group`.
#[derive(Args, Clone, Debug)]
pub struct GroupArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    /// Emit groups only after the whole feed is read
    #[arg(long)]
    pub deferred: bool,

    /// Write groups to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl GroupArgs {
    pub fn group_config(&self) -> Result<GroupConfig<Value>, SyncError> {
        Ok(GroupConfig::new(&self.feed.key)?
            .with_chunk_size(self.feed.chunk_size)
            .with_ignore_undefined(self.feed.ignore_undefined)
            .with_continuous(!self.deferred))
    }
}
