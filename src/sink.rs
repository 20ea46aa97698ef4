//! Stock action sinks

use crate::group::{Group, GroupSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use sync_core::{Action, ActionSink, SyncError, Update};

/// Records every dispatched action in order.
#[derive(Debug)]
pub struct ActionCollector<R> {
    pub actions: Vec<Action<R>>,
    pub error: Option<String>,
}

impl<R> Default for ActionCollector<R> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            error: None,
        }
    }
}

impl<R> ActionCollector<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> impl Iterator<Item = &Update<R>> {
        self.actions.iter().filter_map(|action| match action {
            Action::Update(update) => Some(update),
            _ => None,
        })
    }

    pub fn created(&self) -> impl Iterator<Item = &R> {
        self.actions.iter().filter_map(|action| match action {
            Action::Create { item } => Some(item),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &R> {
        self.actions.iter().filter_map(|action| match action {
            Action::Remove { item } => Some(item),
            _ => None,
        })
    }
}

#[async_trait]
impl<R: Send + 'static> ActionSink<R> for ActionCollector<R> {
    async fn on_update(&mut self, update: Update<R>) -> Result<()> {
        self.actions.push(Action::Update(update));
        Ok(())
    }

    async fn on_create(&mut self, item: R) -> Result<()> {
        self.actions.push(Action::Create { item });
        Ok(())
    }

    async fn on_remove(&mut self, item: R) -> Result<()> {
        self.actions.push(Action::Remove { item });
        Ok(())
    }

    fn on_error(&mut self, error: &SyncError) {
        self.error = Some(error.to_string());
    }
}

/// Writes every action or group as one JSON object per line.
///
/// In dry-run mode nothing is written; only the count advances.
pub struct JsonlWriter<W: Write + Send> {
    out: W,
    dry_run: bool,
    written: usize,
}

impl<W: Write + Send> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            dry_run: false,
            written: 0,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Lines written, or that would have been written in dry-run mode
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.written += 1;
        if self.dry_run {
            return Ok(());
        }

        serde_json::to_writer(&mut self.out, value).context("Failed to serialize output line")?;
        self.out
            .write_all(b"\n")
            .context("Failed to write output line")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush output")
    }
}

#[async_trait]
impl<R, W> ActionSink<R> for JsonlWriter<W>
where
    R: Serialize + Send + Sync + 'static,
    W: Write + Send,
{
    async fn on_update(&mut self, update: Update<R>) -> Result<()> {
        self.write_line(&Action::Update(update))
    }

    async fn on_create(&mut self, item: R) -> Result<()> {
        self.write_line(&Action::Create { item })
    }

    async fn on_remove(&mut self, item: R) -> Result<()> {
        self.write_line(&Action::<R>::Remove { item })
    }

    fn on_error(&mut self, _error: &SyncError) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("Failed to flush output after error: {e}");
        }
    }
}

#[async_trait]
impl<R, W> GroupSink<R> for JsonlWriter<W>
where
    R: Serialize + Send + Sync + 'static,
    W: Write + Send,
{
    async fn on_group(&mut self, group: Group<R>) -> Result<()> {
        self.write_line(&group)
    }
}
