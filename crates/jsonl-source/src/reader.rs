//! Paginated JSON Lines reader

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use sync_core::PageReader;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Default number of records per page
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Serves JSON Lines records page by page.
///
/// Blank lines are skipped. Pages must be requested in order, since the
/// underlying reader only moves forward.
pub struct JsonlPageReader<B> {
    name: String,
    lines: Lines<B>,
    chunk_size: usize,
    next_page: usize,
    line_number: usize,
}

impl JsonlPageReader<BufReader<File>> {
    /// Open a local JSON Lines file.
    ///
    /// # Arguments
    /// * `path` - Path to the file
    /// * `chunk_size` - Records per page; `0` reads the whole file as one page
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open JSONL file: {}", path.display()))?;

        tracing::debug!("Opened JSONL feed {} (chunk size {chunk_size})", path.display());

        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
            chunk_size,
        ))
    }
}

impl<B: AsyncBufRead + Unpin + Send> JsonlPageReader<B> {
    /// Wrap any buffered async reader; `name` appears in error messages.
    pub fn from_reader(reader: B, name: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
            chunk_size,
            next_page: 0,
            line_number: 0,
        }
    }

    async fn next_record(&mut self) -> Result<Option<Value>> {
        while let Some(line) = self
            .lines
            .next_line()
            .await
            .with_context(|| format!("Failed to read from {}", self.name))?
        {
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let value = serde_json::from_str(&line).map_err(|e| {
                anyhow!(
                    "Error parsing JSON at line {} of {}: {e}",
                    self.line_number,
                    self.name
                )
            })?;
            return Ok(Some(value));
        }
        Ok(None)
    }
}

#[async_trait]
impl<B: AsyncBufRead + Unpin + Send> PageReader<Value> for JsonlPageReader<B> {
    async fn read_page(&mut self, page: usize) -> Result<Vec<Value>> {
        if page != self.next_page {
            bail!(
                "JSONL feed {} must be read in order: expected page {}, got {page}",
                self.name,
                self.next_page
            );
        }
        self.next_page += 1;

        let mut records = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_SIZE));
        while self.chunk_size == 0 || records.len() < self.chunk_size {
            match self.next_record().await? {
                Some(record) => records.push(record),
                None => break,
            }
        }

        tracing::debug!(
            "Read page {page} of {} records from {}",
            records.len(),
            self.name
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_pages_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("feed.jsonl");
        std::fs::write(
            &file_path,
            "{\"id\":1}\n{\"id\":2}\n\n{\"id\":3}\n{\"id\":4}\n{\"id\":5}\n",
        )
        .unwrap();

        let mut reader = JsonlPageReader::open(&file_path, 2).await.unwrap();

        assert_eq!(
            reader.read_page(0).await.unwrap(),
            vec![json!({"id": 1}), json!({"id": 2})]
        );
        assert_eq!(
            reader.read_page(1).await.unwrap(),
            vec![json!({"id": 3}), json!({"id": 4})]
        );
        assert_eq!(reader.read_page(2).await.unwrap(), vec![json!({"id": 5})]);
        assert!(reader.read_page(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchunked_reads_everything() {
        let data: &[u8] = b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}";
        let mut reader = JsonlPageReader::from_reader(data, "inline", 0);

        assert_eq!(reader.read_page(0).await.unwrap().len(), 3);
        assert!(reader.read_page(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_reports_line() {
        let data: &[u8] = b"{\"id\":1}\n\nnot json\n";
        let mut reader = JsonlPageReader::from_reader(data, "broken.jsonl", 10);

        let err = reader.read_page(0).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Error parsing JSON at line 3 of broken.jsonl"));
    }

    #[tokio::test]
    async fn test_out_of_order_page_rejected() {
        let data: &[u8] = b"{\"id\":1}\n";
        let mut reader = JsonlPageReader::from_reader(data, "inline", 1);

        let err = reader.read_page(1).await.unwrap_err();
        assert!(err.to_string().contains("expected page 0, got 1"));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = JsonlPageReader::open("/nonexistent/feed.jsonl", 10).await;
        assert!(result.is_err());
    }
}
