//! Core types for the chunk-sync framework.
//!
//! This crate provides the building blocks used to reconcile two sorted,
//! independently paginated feeds:
//!
//! - [`Key`] / [`KeyPath`] / [`Record`] - key model and key accessor
//! - [`compare_chunk`] / [`compare_pages`] - the chunk comparator
//! - [`ChunkDiff`] - classification of one page pair, including carry-over
//! - [`PageReader`] / [`ActionSink`] - collaborator traits used by the driver
//! - [`SyncError`] - error taxonomy shared by every layer
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── chunk-sync-jsonl-source  (PageReader over JSON Lines files)
//!    │
//!    └─── chunk-sync               (driver, grouping, sinks, CLI)
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use sync_core::{compare_chunk, CompareOpts, DuplicatePolicy};
//!
//! let opts = CompareOpts::new("id")
//!     .unwrap()
//!     .with_chunk_size(2)
//!     .with_duplicates(DuplicatePolicy::Both);
//!
//! let diff = compare_chunk(
//!     &opts,
//!     vec![json!({"id": 1}), json!({"id": 2})],
//!     vec![json!({"id": 2}), json!({"id": 9})],
//! )
//! .unwrap();
//!
//! assert_eq!(diff.create, vec![json!({"id": 1})]);
//! assert_eq!(diff.update.len(), 1);
//! assert_eq!(diff.next_dest, vec![json!({"id": 9})]);
//! ```

pub mod compare;
pub mod error;
pub mod key;
pub mod source;
pub mod types;
mod walk;

#[cfg(test)]
mod tests;

pub use compare::{compare_chunk, compare_pages, CompareOpts, DecideUpdate, Page};
pub use error::{Result, SyncError, ValidationError};
pub use key::{check_adjacent, Key, KeyKind, KeyLookup, KeyPath, Record};
pub use source::{ActionSink, MemoryFeed, PageReader};
pub use types::{
    Action, ActionKind, ChunkDiff, DuplicatePolicy, FlushPolicy, Ignored, Side, SyncSummary,
    Update,
};
