//! Collaborator traits for feeds and action sinks.

use crate::error::SyncError;
use crate::types::Update;
use anyhow::Result;
use async_trait::async_trait;

/// A paginated feed sorted ascending by key.
///
/// Pages are requested in order starting at 0. A page shorter than the
/// configured chunk size marks the end of the feed; the driver never requests
/// another page after it.
#[async_trait]
pub trait PageReader<R>: Send {
    async fn read_page(&mut self, page: usize) -> Result<Vec<R>>;
}

/// Receives the actions a synchronization run decides on.
///
/// Calls are strictly sequential: each one is awaited before the next is
/// made, and the first error aborts the run.
#[async_trait]
pub trait ActionSink<R: Send + 'static>: Send {
    /// Apply a matched pair the update decision accepted.
    async fn on_update(&mut self, update: Update<R>) -> Result<()>;

    /// Create a source record missing from the destination.
    async fn on_create(&mut self, item: R) -> Result<()>;

    /// Remove a destination record missing from the source.
    async fn on_remove(&mut self, item: R) -> Result<()>;

    /// Called once when the run aborts, before the error is returned.
    fn on_error(&mut self, _error: &SyncError) {}
}

/// An in-memory feed served in pages of `chunk_size` (all at once when 0).
#[derive(Debug, Clone)]
pub struct MemoryFeed<R> {
    items: Vec<R>,
    chunk_size: usize,
}

impl<R> MemoryFeed<R> {
    pub fn new(items: Vec<R>, chunk_size: usize) -> Self {
        Self { items, chunk_size }
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> PageReader<R> for MemoryFeed<R> {
    async fn read_page(&mut self, page: usize) -> Result<Vec<R>> {
        if self.chunk_size == 0 {
            return Ok(if page == 0 { self.items.clone() } else { Vec::new() });
        }

        let start = page.saturating_mul(self.chunk_size).min(self.items.len());
        let end = start.saturating_add(self.chunk_size).min(self.items.len());
        Ok(self.items[start..end].to_vec())
    }
}
