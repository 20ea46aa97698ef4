//! ChunkSync Library
//!
//! Reconciles a destination dataset with a source dataset when both are
//! streamed as sorted, independently paginated feeds.
//!
//! # Features
//!
//! - Streaming synchronization: bounded memory, one page pair per round
//! - Carry-over: records beyond the other side's page range wait for the next round
//! - Duplicate policies per side, with collapsed duplicates reported as ignored
//! - Chunked grouping of a single sorted feed by key
//! - JSON Lines feeds and action output
//!
//! # Crates
//!
//! - `sync_core` - key model, chunk comparator, collaborator traits
//! - `chunk_sync_jsonl_source` - paginated JSON Lines reader
//!
//! # CLI Usage
//!
//! ```bash
//! # Actions that turn dest.jsonl into source.jsonl, 500 records per page
//! chunk-sync diff --source source.jsonl --dest dest.jsonl --key id --chunk-size 500
//!
//! # Group a feed by the `t` field
//! chunk-sync group --source events.jsonl --key t
//! ```

pub mod args;
pub mod group;
pub mod sink;
pub mod sync;

pub use chunk_sync_jsonl_source as jsonl;

pub use group::{group, group_chunk, DecideGroup, Group, GroupConfig, GroupSink, GroupSummary};
pub use sink::{ActionCollector, JsonlWriter};
pub use sync::{synchronize, Config};
