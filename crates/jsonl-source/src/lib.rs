//! JSON Lines feed for chunk-sync
//!
//! This crate provides a [`PageReader`](sync_core::PageReader) that serves a
//! JSON Lines file (one JSON object per line, sorted by key) in fixed-size
//! pages, so large files are never loaded whole.

mod reader;

pub use reader::{JsonlPageReader, DEFAULT_CHUNK_SIZE};
