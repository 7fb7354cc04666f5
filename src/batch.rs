//! Batch pipeline driver.
//!
//! Runs filter, mask and (optionally) write-back for many extracted record
//! files. Each document is processed synchronously on its own; documents run
//! in parallel on a bounded rayon pool and every outcome is reported, failed
//! or not.

use crate::error::{Error, Result};
use crate::filter::{filter_records, FilterOptions};
use crate::io::{
    detect_format_from_path, output_path, output_prefix, read_records, write_jsonl_items,
    write_records, Layout, RecordFormat,
};
use crate::mask::{check_identity, mask_records, write_identity_debug, MaskOptions};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[cfg(feature = "xlsx")]
use crate::writeback::{apply_masks, default_output_path, ApplyOptions, ApplyReport};

/// File name tag of extractor output.
pub const INTERMEDIATE_TAG: &str = "intermediate";

/// Options for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Filter stage options.
    pub filter: FilterOptions,

    /// Masking stage options.
    pub mask: MaskOptions,

    /// Worker threads (0 = one per CPU).
    pub jobs: usize,

    /// Abort the batch at the first failing document.
    pub stop_on_error: bool,

    /// Apply masks to source workbooks found in the records.
    #[cfg(feature = "xlsx")]
    pub write_back: bool,

    /// Write-back options; the output path is derived per workbook.
    #[cfg(feature = "xlsx")]
    pub apply: ApplyOptions,

    /// Directory for all outputs; beside each input when unset.
    pub out_dir: Option<PathBuf>,
}

impl BatchOptions {
    /// Creates new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets filter options.
    pub fn with_filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    /// Sets masking options.
    pub fn with_mask(mut self, mask: MaskOptions) -> Self {
        self.mask = mask;
        self
    }

    /// Sets the number of worker threads.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Aborts at the first failure.
    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }

    /// Enables workbook write-back with the given options.
    #[cfg(feature = "xlsx")]
    pub fn with_write_back(mut self, apply: ApplyOptions) -> Self {
        self.write_back = true;
        self.apply = apply;
        self
    }

    /// Writes every output under `dir`.
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    /// Output prefix for an input file.
    fn prefix_for(&self, input: &Path) -> String {
        let prefix = output_prefix(input, INTERMEDIATE_TAG);
        match &self.out_dir {
            Some(dir) => {
                let name = Path::new(&prefix)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or(prefix.clone());
                dir.join(name).to_string_lossy().to_string()
            }
            None => prefix,
        }
    }
}

/// Result of processing one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub input: PathBuf,
    /// Records read from the input
    pub records_in: usize,
    /// Records kept by the filter
    pub pii: usize,
    /// Records in the drop log
    pub dropped: usize,
    /// Masked records written
    pub masked: usize,
    /// Whether masking changed the set of record identities
    pub identity_mismatch: bool,
    /// Files written, in order
    pub outputs: Vec<PathBuf>,
    /// Per-workbook write-back results
    #[cfg(feature = "xlsx")]
    pub write_back: Vec<(PathBuf, ApplyReport)>,
}

/// Final state of one document in a batch.
#[derive(Debug, Clone)]
pub enum DocumentStatus {
    Completed(DocumentReport),
    Failed {
        message: String,
        /// Error message followed by its sources
        trace: Vec<String>,
    },
    /// Not started because the batch was aborted
    Skipped,
}

/// One document's outcome.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub status: DocumentStatus,
}

impl DocumentOutcome {
    /// Returns true if the document completed.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, DocumentStatus::Completed(_))
    }
}

/// Outcomes of a batch run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
    /// Set when `stop_on_error` ended the run early
    pub aborted: bool,
}

impl BatchReport {
    /// Number of completed documents.
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Number of failed documents.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DocumentStatus::Failed { .. }))
            .count()
    }

    /// Number of documents never started.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DocumentStatus::Skipped))
            .count()
    }

    /// Converts an aborted run into [`Error::BatchAborted`] naming the first failure.
    pub fn into_result(self) -> Result<Self> {
        if !self.aborted {
            return Ok(self);
        }
        let failure = self.outcomes.iter().find_map(|o| match &o.status {
            DocumentStatus::Failed { message, .. } => Some((o.path.clone(), message.clone())),
            _ => None,
        });
        match failure {
            Some((path, message)) => Err(Error::BatchAborted { path, message }),
            None => Ok(self),
        }
    }
}

/// Expands files and directories into the list of inputs.
///
/// Directories are walked for `*.intermediate.jsonl` / `*.intermediate.csv`;
/// files named explicitly are kept as given so unsupported ones fail loudly.
pub fn discover_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    let mut explicit = Vec::new();

    for path in paths {
        if !path.is_dir() {
            explicit.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if entry.file_type().is_file() && is_intermediate_file(entry.path()) {
                found.insert(entry.path().to_path_buf());
            }
        }
    }

    let mut inputs = explicit;
    inputs.extend(found);
    inputs
}

fn is_intermediate_file(path: &Path) -> bool {
    if detect_format_from_path(path).is_err() {
        return false;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(&format!(".{}", INTERMEDIATE_TAG)))
}

/// Runs the full pipeline for one record file.
pub fn run_document(input: impl AsRef<Path>, options: &BatchOptions) -> Result<DocumentReport> {
    let input = input.as_ref();
    let records = read_records(input)?;
    let prefix = options.prefix_for(input);

    if let Some(dir) = &options.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut report = DocumentReport {
        input: input.to_path_buf(),
        records_in: records.len(),
        ..Default::default()
    };

    // Filter
    let outcome = filter_records(&records, &options.filter);
    report.pii = outcome.records.len();
    report.dropped = outcome.dropped.len();
    for format in [RecordFormat::Jsonl, RecordFormat::Csv] {
        let path = output_path(&prefix, "pii", format);
        write_records(&path, &outcome.records, Layout::Pii)?;
        report.outputs.push(path);
    }
    if !outcome.dropped.is_empty() {
        let path = output_path(&prefix, "pii_dropped", RecordFormat::Jsonl);
        write_jsonl_items(&path, outcome.dropped.entries())?;
        report.outputs.push(path);
    }

    // Mask
    let masked = mask_records(&outcome.records, &options.mask)?;
    report.masked = masked.len();
    let integrity = check_identity(&outcome.records, &masked);
    report.identity_mismatch = !integrity.is_consistent();
    report.outputs.extend(write_identity_debug(&prefix, &integrity)?);

    let tag = options.mask.output.file_tag();
    for format in [RecordFormat::Jsonl, RecordFormat::Csv] {
        let path = output_path(&prefix, tag, format);
        write_records(&path, &masked, Layout::Masked(options.mask.output))?;
        report.outputs.push(path);
    }

    #[cfg(feature = "xlsx")]
    if options.write_back {
        for workbook in source_workbooks(&masked) {
            let mut apply = options.apply.clone();
            if apply.out_path.is_none() {
                let default = default_output_path(&workbook);
                apply.out_path = Some(match &options.out_dir {
                    Some(dir) => dir.join(default.file_name().unwrap_or_default()),
                    None => default,
                });
            }
            let applied = apply_masks(&workbook, &masked, &apply)?;
            if let Some(out) = &applied.output {
                report.outputs.push(out.clone());
            }
            report.write_back.push((workbook, applied));
        }
    }

    info!(
        input = %input.display(),
        pii = report.pii,
        masked = report.masked,
        outputs = report.outputs.len(),
        "document processed"
    );
    Ok(report)
}

/// Existing `.xlsx` files referenced by xlsx records.
#[cfg(feature = "xlsx")]
fn source_workbooks(records: &[crate::model::Record]) -> Vec<PathBuf> {
    use crate::model::SourceType;

    records
        .iter()
        .filter(|r| r.source_type == SourceType::Xlsx)
        .map(|r| r.source_path.trim())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
                && p.is_file()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Runs the pipeline over every discovered input.
pub fn run_batch(inputs: &[PathBuf], options: &BatchOptions) -> Result<BatchReport> {
    let documents = discover_inputs(inputs);
    if documents.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("thread pool: {}", e)))?;

    debug!(documents = documents.len(), jobs = options.jobs, "batch started");

    let abort = AtomicBool::new(false);
    let outcomes: Vec<DocumentOutcome> = pool.install(|| {
        documents
            .par_iter()
            .map(|path| DocumentOutcome {
                path: path.clone(),
                status: run_guarded(path, options, &abort),
            })
            .collect()
    });

    let report = BatchReport {
        aborted: abort.load(Ordering::SeqCst),
        outcomes,
    };
    if report.skipped() > 0 {
        warn!(skipped = report.skipped(), "batch aborted before all documents ran");
    }
    Ok(report)
}

fn run_guarded(path: &Path, options: &BatchOptions, abort: &AtomicBool) -> DocumentStatus {
    if abort.load(Ordering::SeqCst) {
        return DocumentStatus::Skipped;
    }
    match run_document(path, options) {
        Ok(report) => DocumentStatus::Completed(report),
        Err(e) => {
            warn!(input = %path.display(), error = %e, "document failed");
            if options.stop_on_error {
                abort.store(true, Ordering::SeqCst);
            }
            DocumentStatus::Failed {
                message: e.to_string(),
                trace: e.trace(),
            }
        }
    }
}
