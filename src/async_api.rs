//! Async API for non-blocking pipeline runs.
//!
//! Enable the `async` feature to use these APIs:
//!
//! ```toml
//! [dependencies]
//! piimask = { version = "0.1", features = ["async"] }
//! ```
//!
//! The pipeline itself is CPU-bound and synchronous; these wrappers move it
//! onto Tokio's blocking pool.

use crate::batch::{BatchOptions, BatchReport, DocumentReport};
use crate::error::{Error, Result};
use crate::model::Record;
use std::path::{Path, PathBuf};
use tokio::fs;

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}

/// Asynchronously runs filter, mask and write-back for one record file.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> piimask::Result<()> {
/// use piimask::BatchOptions;
///
/// let report = piimask::async_api::run_document("staff.intermediate.jsonl", &BatchOptions::new()).await?;
/// println!("PII records: {}", report.pii);
/// # Ok(())
/// # }
/// ```
pub async fn run_document(path: impl AsRef<Path>, options: &BatchOptions) -> Result<DocumentReport> {
    let path = path.as_ref().to_path_buf();
    let options = options.clone();
    tokio::task::spawn_blocking(move || crate::batch::run_document(&path, &options))
        .await
        .map_err(join_error)?
}

/// Asynchronously runs the pipeline over many inputs.
pub async fn run_batch(inputs: &[PathBuf], options: &BatchOptions) -> Result<BatchReport> {
    let inputs = inputs.to_vec();
    let options = options.clone();
    tokio::task::spawn_blocking(move || crate::batch::run_batch(&inputs, &options))
        .await
        .map_err(join_error)?
}

/// Asynchronously reads a record file.
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref().to_path_buf();
    // Fail early on a missing file without occupying a blocking thread
    fs::metadata(&path).await?;
    tokio::task::spawn_blocking(move || crate::io::read_records(&path))
        .await
        .map_err(join_error)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{write_records, Layout};
    use crate::model::SourceType;

    #[tokio::test]
    async fn test_async_run_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.intermediate.jsonl");
        let record = Record::new(SourceType::Xlsx, "kim@example.com")
            .with_container("Sheet1")
            .with_position(1, 1);
        write_records(&input, &[record], Layout::Intermediate).unwrap();

        let records = read_records(&input).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.len(), 16);

        let report = run_document(&input, &BatchOptions::new()).await.unwrap();
        assert_eq!(report.pii, 1);
    }

    #[tokio::test]
    async fn test_async_missing_file() {
        assert!(matches!(
            read_records("/nonexistent/x.jsonl").await,
            Err(Error::Io(_))
        ));
    }
}
