//! # piimask
//!
//! Detects Korean personal information in records extracted from documents
//! and produces format-preserving masks, optionally writing them back onto
//! the source spreadsheet.
//!
//! ## Pipeline
//!
//! - **Filter**: classify each record (`name`, `rrn`, `phone`, `email`,
//!   `address`, `card`, `passport`, `driver_license`), drop the rest, and
//!   deduplicate. PDF text tokens may first be joined into lines.
//! - **Mask**: produce one masked record per input record.
//! - **Write-back** (`xlsx` feature): replace workbook cell values with their
//!   masks, verifying that each cell still holds the original value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use piimask::{filter_file, mask_file, FilterOptions, MaskOptions};
//!
//! fn main() -> piimask::Result<()> {
//!     // Writes staff.pii.jsonl and staff.pii.csv
//!     let outcome = filter_file("staff.intermediate.jsonl", None, &FilterOptions::default())?;
//!     println!("PII records: {}", outcome.records.len());
//!
//!     // Writes staff.masked.jsonl and staff.masked.csv
//!     let masked = mask_file("staff.pii.jsonl", None, &MaskOptions::default())?;
//!     println!("Masked: {}", masked.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `xlsx` (default): workbook write-back
//! - `async`: async API with Tokio

pub mod batch;
pub mod classify;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod io;
pub mod lines;
pub mod mask;
pub mod model;
pub mod normalize;

#[cfg(feature = "xlsx")]
pub mod xlsx;

#[cfg(feature = "xlsx")]
pub mod writeback;

#[cfg(feature = "async")]
pub mod async_api;

// Re-exports
pub use batch::{
    discover_inputs, run_batch, run_document, BatchOptions, BatchReport, DocumentOutcome,
    DocumentReport, DocumentStatus,
};
pub use classify::classify;
pub use dedupe::DedupeMode;
pub use error::{Error, Result};
pub use filter::{filter_records, DropReason, FilterOptions, FilterOutcome};
pub use io::{read_records, write_records, Layout, RecordFormat};
pub use mask::{mask, mask_records, MaskOptions, OutputMode};
pub use model::{BBox, CellKey, Context, PiiType, Record, SourceType};
pub use normalize::normalize;

#[cfg(feature = "xlsx")]
pub use writeback::{apply_masks, ApplyOptions, ApplyReport, VerifyMode};

use io::{output_path, output_prefix, write_jsonl_items};
use std::path::Path;
use tracing::info;

/// Filters an extracted record file and writes the PII outputs.
///
/// Writes `{prefix}.pii.jsonl` and `{prefix}.pii.csv`, plus
/// `{prefix}.pii_dropped.jsonl` when the drop log is enabled and non-empty.
/// The prefix defaults to the input path without its extension and
/// `.intermediate` tag.
///
/// # Example
///
/// ```no_run
/// use piimask::{filter_file, DedupeMode, FilterOptions};
///
/// let options = FilterOptions::new()
///     .with_dedupe(DedupeMode::ByText)
///     .with_line_aggregation(2.0);
/// let outcome = filter_file("report.intermediate.csv", Some("out/report"), &options)?;
/// println!("kept {}, dropped {}", outcome.records.len(), outcome.dropped.len());
/// # Ok::<(), piimask::Error>(())
/// ```
pub fn filter_file(
    input: impl AsRef<Path>,
    out_prefix: Option<&str>,
    options: &FilterOptions,
) -> Result<FilterOutcome> {
    let input = input.as_ref();
    let records = read_records(input)?;
    let outcome = filter_records(&records, options);

    let prefix = out_prefix
        .map(str::to_string)
        .unwrap_or_else(|| output_prefix(input, batch::INTERMEDIATE_TAG));
    ensure_parent(&prefix)?;

    for format in [RecordFormat::Jsonl, RecordFormat::Csv] {
        write_records(output_path(&prefix, "pii", format), &outcome.records, Layout::Pii)?;
    }
    if !outcome.dropped.is_empty() {
        write_jsonl_items(
            output_path(&prefix, "pii_dropped", RecordFormat::Jsonl),
            outcome.dropped.entries(),
        )?;
    }

    info!(input = %input.display(), pii = outcome.records.len(), prefix = %prefix, "filter written");
    Ok(outcome)
}

/// Masks a PII record file and writes the masked outputs.
///
/// Writes `{prefix}.{tag}.jsonl` and `{prefix}.{tag}.csv`, where the tag
/// follows the output mode. The prefix defaults to the input path without
/// its extension and `.pii` tag. A warning and debug id lists are written if
/// the record identities changed.
///
/// # Example
///
/// ```no_run
/// use piimask::{mask_file, MaskOptions, OutputMode};
///
/// let options = MaskOptions::new()
///     .with_type_selector("phone,email")?
///     .with_output(OutputMode::Replace);
/// let masked = mask_file("staff.pii.jsonl", None, &options)?;
/// # Ok::<(), piimask::Error>(())
/// ```
pub fn mask_file(
    input: impl AsRef<Path>,
    out_prefix: Option<&str>,
    options: &MaskOptions,
) -> Result<Vec<Record>> {
    let input = input.as_ref();
    let records = read_records(input)?;
    let masked = mask_records(&records, options)?;

    let prefix = out_prefix
        .map(str::to_string)
        .unwrap_or_else(|| output_prefix(input, "pii"));
    ensure_parent(&prefix)?;

    let integrity = mask::check_identity(&records, &masked);
    mask::write_identity_debug(&prefix, &integrity)?;

    let tag = options.output.file_tag();
    for format in [RecordFormat::Jsonl, RecordFormat::Csv] {
        write_records(
            output_path(&prefix, tag, format),
            &masked,
            Layout::Masked(options.output),
        )?;
    }

    info!(input = %input.display(), masked = masked.len(), prefix = %prefix, "mask written");
    Ok(masked)
}

/// Applies a masked record file onto a workbook.
///
/// # Example
///
/// ```no_run
/// use piimask::{apply_file, ApplyOptions};
///
/// let report = apply_file("staff.xlsx", "staff.masked.jsonl", &ApplyOptions::new().dry_run())?;
/// println!("{} of {} cells would change", report.applied, report.total);
/// # Ok::<(), piimask::Error>(())
/// ```
#[cfg(feature = "xlsx")]
pub fn apply_file(
    xlsx_path: impl AsRef<Path>,
    masked_path: impl AsRef<Path>,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let records = read_records(masked_path)?;
    apply_masks(xlsx_path, &records, options)
}

fn ensure_parent(prefix: &str) -> Result<()> {
    if let Some(parent) = Path::new(prefix).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
