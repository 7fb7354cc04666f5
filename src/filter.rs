//! PII filter stage.
//!
//! Runs the classifier and deduplicator over an extracted record stream and
//! keeps only records that carry one of the eight PII categories. The stage
//! works in two passes:
//!
//! 1. Every record is normalized, classified (with an exact-header fallback)
//!    and admitted through the dedupe set.
//! 2. Every `pdf_line` record is rescanned for an inline "성명: 홍길동" style
//!    label; the captured name is emitted as an extra `name` record, subject
//!    to the same dedupe set.
//!
//! Rejected records are collected in a [`DropLog`] when requested.

use crate::classify::classify;
use crate::dedupe::{DedupeMode, DedupeSet};
use crate::lines::{aggregate_lines, DEFAULT_LINE_Y_TOL};
use crate::model::{Context, PiiType, Record, SourceType};
use crate::normalize::normalize;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

static RE_INLINE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(성명|이름)\s*[: ]?\s*([가-힣]{2,4})").unwrap());

// Exact (trimmed, lower-cased) header matches used when the cascade misses.
const FALLBACK_NAME_HEADERS: &[&str] = &[
    "성명", "이름", "한글이름", "영문이름", "대표자", "담당자", "name", "full name",
];
const FALLBACK_EMAIL_HEADERS: &[&str] = &["이메일", "email", "email 주소"];
const FALLBACK_PHONE_HEADERS: &[&str] = &["연락처", "전화", "전화번호", "mobile", "phone"];
const FALLBACK_ADDRESS_HEADERS: &[&str] = &["주소", "집주소", "address"];

/// Bounds on the compacted length of a header-fallback name.
const FALLBACK_NAME_LEN: std::ops::RangeInclusive<usize> = 1..=50;

/// Options for the filter stage.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Deduplication policy.
    pub dedupe: DedupeMode,

    /// Whether to append synthetic `pdf_line` records before filtering.
    pub aggregate_lines: bool,

    /// Vertical tolerance for line aggregation.
    pub line_y_tol: f64,

    /// Whether the exact-header fallback applies when the cascade misses.
    pub header_fallback: bool,

    /// Whether rejected records are collected in the drop log.
    pub debug_drops: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            dedupe: DedupeMode::ByLocation,
            aggregate_lines: false,
            line_y_tol: DEFAULT_LINE_Y_TOL,
            header_fallback: true,
            debug_drops: false,
        }
    }
}

impl FilterOptions {
    /// Creates new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deduplication policy.
    pub fn with_dedupe(mut self, mode: DedupeMode) -> Self {
        self.dedupe = mode;
        self
    }

    /// Enables line aggregation with the given tolerance.
    pub fn with_line_aggregation(mut self, y_tol: f64) -> Self {
        self.aggregate_lines = true;
        self.line_y_tol = y_tol;
        self
    }

    /// Disables the exact-header fallback.
    pub fn without_header_fallback(mut self) -> Self {
        self.header_fallback = false;
        self
    }

    /// Collects rejected records in the drop log.
    pub fn with_debug_drops(mut self) -> Self {
        self.debug_drops = true;
        self
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No category matched
    Unclassified,
    /// A record with the same key was kept earlier
    Duplicate(DedupeMode),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Unclassified => f.write_str("classify:none"),
            DropReason::Duplicate(mode) => write!(f, "dedupe:{}", mode),
        }
    }
}

/// One rejected record.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(rename = "_drop_reason", serialize_with = "serialize_reason")]
    pub reason: DropReason,
    #[serde(rename = "_norm_text", skip_serializing_if = "Option::is_none")]
    pub norm_text: Option<String>,
}

fn serialize_reason<S>(reason: &DropReason, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(reason)
}

/// Rejected records of one filter invocation, in rejection order.
#[derive(Debug, Clone, Default)]
pub struct DropLog {
    entries: Vec<DroppedRecord>,
}

impl DropLog {
    fn push(&mut self, record: Record, reason: DropReason, norm_text: Option<String>) {
        self.entries.push(DroppedRecord {
            record,
            reason,
            norm_text,
        });
    }

    /// Returns the rejected records.
    pub fn entries(&self) -> &[DroppedRecord] {
        &self.entries
    }

    /// Number of rejected records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one filter invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Kept PII records, text normalized, `pii_type` set
    pub records: Vec<Record>,
    /// Rejected records; empty unless `debug_drops` was set
    pub dropped: DropLog,
}

/// Filters an extracted record stream down to deduplicated PII records.
pub fn filter_records(records: &[Record], options: &FilterOptions) -> FilterOutcome {
    let synthetic = if options.aggregate_lines {
        aggregate_lines(records, options.line_y_tol)
    } else {
        Vec::new()
    };
    let input: Vec<&Record> = records.iter().chain(synthetic.iter()).collect();

    let mut seen = DedupeSet::new(options.dedupe);
    let mut outcome = FilterOutcome::default();
    let mut duplicates = 0usize;

    for &record in &input {
        let text_norm = normalize(&record.text);
        let ctx = Context::from(record);

        let mut pii_type = classify(&text_norm, &ctx);
        if pii_type.is_none() && options.header_fallback {
            pii_type = header_fallback(&record.header, &text_norm);
        }

        let Some(pii_type) = pii_type else {
            if options.debug_drops {
                outcome
                    .dropped
                    .push(record.clone(), DropReason::Unclassified, Some(text_norm));
            }
            continue;
        };

        let mut kept = record.clone();
        kept.text = text_norm;
        kept.pii_type = Some(pii_type);
        admit(kept, &mut seen, &mut outcome, options.debug_drops, &mut duplicates);
    }

    let first_pass = outcome.records.len();

    for &record in &input {
        if record.source_type != SourceType::PdfLine {
            continue;
        }
        let line = normalize(&record.text);
        let Some(name) = RE_INLINE_NAME.captures(&line).and_then(|c| c.get(2)) else {
            continue;
        };

        let mut kept = record.clone();
        kept.text = name.as_str().to_string();
        kept.pii_type = Some(PiiType::Name);
        admit(kept, &mut seen, &mut outcome, options.debug_drops, &mut duplicates);
    }

    debug!(
        input = records.len(),
        synthetic = synthetic.len(),
        kept = outcome.records.len(),
        inline_names = outcome.records.len() - first_pass,
        duplicates,
        dedupe = %options.dedupe,
        "filter finished"
    );

    outcome
}

fn admit(
    record: Record,
    seen: &mut DedupeSet,
    outcome: &mut FilterOutcome,
    debug_drops: bool,
    duplicates: &mut usize,
) {
    if seen.admit(&record) {
        outcome.records.push(record);
        return;
    }
    *duplicates += 1;
    if debug_drops {
        let mode = seen.mode();
        outcome.dropped.push(record, DropReason::Duplicate(mode), None);
    }
}

/// Assigns a category from an exact header match.
fn header_fallback(header: &str, text_norm: &str) -> Option<PiiType> {
    let header = header.trim().to_lowercase();
    let header = header.as_str();

    if FALLBACK_NAME_HEADERS.contains(&header) {
        let core_len = text_norm.chars().filter(|&c| c != ' ' && c != '·').count();
        return FALLBACK_NAME_LEN.contains(&core_len).then_some(PiiType::Name);
    }
    if FALLBACK_EMAIL_HEADERS.contains(&header) {
        return Some(PiiType::Email);
    }
    if FALLBACK_PHONE_HEADERS.contains(&header) {
        return Some(PiiType::Phone);
    }
    if FALLBACK_ADDRESS_HEADERS.contains(&header) {
        return Some(PiiType::Address);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn cell(row: i64, col: i64, header: &str, text: &str) -> Record {
        Record::new(SourceType::Xlsx, text)
            .with_source_path("/data/staff.xlsx")
            .with_container("Sheet1")
            .with_position(row, col)
            .with_header(header)
    }

    #[test]
    fn test_keeps_only_pii() {
        let records = vec![
            cell(2, 1, "성명", "홍길동"),
            cell(2, 2, "부서", "영업팀"),
            cell(2, 3, "연락처", "010-1234-5678"),
        ];
        let out = filter_records(&records, &FilterOptions::default());
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].pii_type, Some(PiiType::Name));
        assert_eq!(out.records[1].pii_type, Some(PiiType::Phone));
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_kept_text_is_normalized() {
        let records = vec![cell(2, 3, "", " 010\u{2013}1234\u{200B}-5678 ")];
        let out = filter_records(&records, &FilterOptions::default());
        assert_eq!(out.records[0].text, "010-1234-5678");
    }

    #[test]
    fn test_same_text_distinct_cells_kept() {
        let records = vec![cell(2, 1, "성명", "홍길동"), cell(3, 1, "성명", "홍길동")];
        let out = filter_records(&records, &FilterOptions::default());
        assert_eq!(out.records.len(), 2);

        let by_text = FilterOptions::new().with_dedupe(DedupeMode::ByText);
        let out = filter_records(&records, &by_text);
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_header_fallback() {
        let records = vec![cell(2, 1, "대표자", "John Smith"), cell(2, 2, "Mobile", "n/a")];
        let out = filter_records(&records, &FilterOptions::default());
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].pii_type, Some(PiiType::Name));
        assert_eq!(out.records[1].pii_type, Some(PiiType::Phone));

        let strict = FilterOptions::new().without_header_fallback();
        assert!(filter_records(&records, &strict).records.is_empty());
    }

    #[test]
    fn test_header_fallback_name_length_guard() {
        let long = "가".repeat(51);
        let records = vec![cell(2, 1, "담당자", &long), cell(3, 1, "담당자", " · ")];
        let out = filter_records(&records, &FilterOptions::default());
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_name_guard_not_rescued() {
        let records = vec![cell(2, 1, "지급항목", "기본급여")];
        let out = filter_records(&records, &FilterOptions::default());
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_drop_log_reasons() {
        let records = vec![
            cell(2, 1, "비고", "  메모 "),
            cell(2, 2, "", "a@b.co"),
            cell(2, 2, "", "a@b.co"),
        ];
        let opts = FilterOptions::new().with_debug_drops();
        let out = filter_records(&records, &opts);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.dropped.len(), 2);

        let first = &out.dropped.entries()[0];
        assert_eq!(first.reason.to_string(), "classify:none");
        assert_eq!(first.norm_text.as_deref(), Some("메모"));
        assert_eq!(first.record.text, "  메모 ");

        let second = &out.dropped.entries()[1];
        assert_eq!(second.reason.to_string(), "dedupe:by_location");
        assert!(second.norm_text.is_none());

        let json = serde_json::to_value(first).unwrap();
        assert_eq!(json["_drop_reason"], "classify:none");
        assert_eq!(json["_norm_text"], "메모");
        assert_eq!(json["container"], "Sheet1");
    }

    #[test]
    fn test_dedupe_none_keeps_repeats() {
        let records = vec![cell(2, 2, "", "a@b.co"), cell(2, 2, "", "a@b.co")];
        let opts = FilterOptions::new().with_dedupe(DedupeMode::None);
        assert_eq!(filter_records(&records, &opts).records.len(), 2);
    }

    #[test]
    fn test_inline_name_from_aggregated_line() {
        let token = |x: f64, text: &str| {
            Record::new(SourceType::PdfText, text)
                .with_source_path("/docs/form.pdf")
                .with_container("page=1")
                .with_bbox(BBox::new(x, 100.0, x + 20.0, 110.0))
        };
        let records = vec![token(10.0, "성명:"), token(40.0, "홍길동"), token(80.0, "(인)")];
        let opts = FilterOptions::new().with_line_aggregation(2.0);
        let out = filter_records(&records, &opts);

        let names: Vec<_> = out
            .records
            .iter()
            .filter(|r| r.source_type == SourceType::PdfLine)
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].text, "홍길동");
        assert_eq!(names[0].pii_type, Some(PiiType::Name));
        assert_eq!(names[0].id, "line::page=1::100");
    }

    #[test]
    fn test_inline_name_respects_seen_set() {
        let line = Record::new(SourceType::PdfLine, "이름 김철수 성명 김철수")
            .with_container("page=2")
            .with_id("line::page=2::50");
        let records = vec![line.clone(), line];
        let out = filter_records(&records, &FilterOptions::default());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].text, "김철수");
    }

    #[test]
    fn test_deterministic() {
        let records = vec![
            cell(2, 1, "성명", "홍길동"),
            cell(2, 1, "성명", "홍길동"),
            cell(3, 4, "이메일", "kim@example.com"),
        ];
        let a = filter_records(&records, &FilterOptions::default());
        let b = filter_records(&records, &FilterOptions::default());
        assert_eq!(a.records, b.records);
    }
}
