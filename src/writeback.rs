//! Write-back of masked values onto the source workbook.
//!
//! Masked `xlsx` records are joined to workbook cells by sheet name and
//! 1-based `(row, col)`. With verification enabled a cell is overwritten
//! only while it still holds the record's original text.

use crate::error::Result;
use crate::model::{CellKey, Record, SourceType};
use crate::xlsx::{read_cell_values, rewrite_cells, CellValues, Workbook};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// When the current cell value is checked before overwriting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyMode {
    /// Verify records that carry a non-blank `masked_text`
    #[default]
    Auto,
    /// Always verify
    On,
    /// Never verify
    Off,
}

/// Options for write-back.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Verification policy.
    pub verify: VerifyMode,

    /// Overwrite without verification regardless of `verify`.
    pub force: bool,

    /// Count only; the output workbook is not written.
    pub dry_run: bool,

    /// Output path; `{stem}_masked.xlsx` beside the input when unset.
    pub out_path: Option<PathBuf>,
}

impl ApplyOptions {
    /// Creates new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verification policy.
    pub fn with_verify(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    /// Bypasses verification.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Counts without writing.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Sets the output path.
    pub fn with_out_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_path = Some(path.into());
        self
    }
}

/// Write-back statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Candidate records (`applied + skipped`)
    pub total: usize,
    pub applied: usize,
    pub skipped: usize,
    /// Written workbook; `None` on a dry run
    pub output: Option<PathBuf>,
}

/// `{stem}_masked.xlsx` in the input's directory.
pub fn default_output_path(xlsx_path: impl AsRef<Path>) -> PathBuf {
    let path = xlsx_path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}_masked.xlsx", stem))
}

/// Loaded state of one worksheet.
struct SheetState {
    path: String,
    xml: String,
    values: CellValues,
    replacements: HashMap<(i64, i64), String>,
}

/// Applies masked records to a copy of the workbook.
pub fn apply_masks(
    xlsx_path: impl AsRef<Path>,
    records: &[Record],
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let xlsx_path = xlsx_path.as_ref();
    let mut workbook = Workbook::open(xlsx_path)?;
    let target = resolve_path(xlsx_path);

    let mut sheets: HashMap<String, SheetState> = HashMap::new();
    let mut report = ApplyReport::default();

    for record in records {
        if record.source_type != SourceType::Xlsx || !same_source_file(record, &target) {
            continue;
        }

        match apply_one(&mut workbook, &mut sheets, record, options)? {
            true => report.applied += 1,
            false => report.skipped += 1,
        }
    }
    report.total = report.applied + report.skipped;

    debug!(
        total = report.total,
        applied = report.applied,
        skipped = report.skipped,
        dry_run = options.dry_run,
        "write-back finished"
    );

    if options.dry_run {
        return Ok(report);
    }

    let mut replaced = HashMap::new();
    for state in sheets.values().filter(|s| !s.replacements.is_empty()) {
        replaced.insert(state.path.clone(), rewrite_cells(&state.xml, &state.replacements)?);
    }
    let bytes = workbook.to_bytes_with(&replaced)?;

    let out_path = options
        .out_path
        .clone()
        .unwrap_or_else(|| default_output_path(xlsx_path));
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out_path, bytes)?;
    info!(path = %out_path.display(), applied = report.applied, "masked workbook written");

    report.output = Some(out_path);
    Ok(report)
}

/// Applies one record; `Ok(false)` means skipped.
fn apply_one(
    workbook: &mut Workbook,
    sheets: &mut HashMap<String, SheetState>,
    record: &Record,
    options: &ApplyOptions,
) -> Result<bool> {
    let sheet_name = record.container.trim();
    if sheet_name.is_empty() {
        return Ok(false);
    }

    let Some(key) = CellKey::from_record(record).filter(CellKey::is_addressable) else {
        return Ok(false);
    };

    let Some(masked) = pick_masked_value(record) else {
        return Ok(false);
    };
    let has_masked_text = record
        .masked_text
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty());

    if !workbook.has_sheet(sheet_name) {
        return Ok(false);
    }
    let state = match sheets.entry(sheet_name.to_string()) {
        std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
        std::collections::hash_map::Entry::Vacant(e) => {
            let path = workbook
                .sheet_path(sheet_name)
                .unwrap_or_default()
                .to_string();
            let xml = workbook.read_file(&path)?;
            let values = read_cell_values(&xml, workbook.shared_strings())?;
            e.insert(SheetState {
                path,
                xml,
                values,
                replacements: HashMap::new(),
            })
        }
    };

    // Absent cells read as blank and are created on write
    let at = (key.row, key.col);
    let current = state.values.get(&at).map(String::as_str).unwrap_or("");

    let verify = match options.verify {
        VerifyMode::Auto => has_masked_text,
        VerifyMode::On => true,
        VerifyMode::Off => false,
    };
    if !options.force && verify && !record.text.is_empty() && current != record.text {
        return Ok(false);
    }

    if !options.dry_run {
        state.values.insert(at, masked.to_string());
        state.replacements.insert(at, masked.to_string());
    }
    Ok(true)
}

/// `masked_text` when non-blank, else `text` when non-blank.
fn pick_masked_value(record: &Record) -> Option<&str> {
    record
        .masked_text
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(record.text.as_str()).filter(|t| !t.trim().is_empty()))
}

fn resolve_path(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Records without a source path apply to any workbook.
fn same_source_file(record: &Record, target: &Path) -> bool {
    let source = record.source_path.trim();
    source.is_empty() || resolve_path(Path::new(source)) == target
}
