//! Record file I/O.
//!
//! Records travel between stages as JSON lines or as a delimited table with
//! a fixed column set. The format is chosen by file extension.

mod jsonl;
mod table;

pub use jsonl::{read_jsonl, write_jsonl, write_jsonl_items};
pub use table::{read_csv, write_csv};

use crate::error::{Error, Result};
use crate::mask::OutputMode;
use crate::model::Record;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supported record file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One JSON object per line (`.jsonl`)
    Jsonl,
    /// Comma-separated table with a header row (`.csv`)
    Csv,
}

impl RecordFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::Jsonl => "jsonl",
            RecordFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordFormat::Jsonl => write!(f, "JSON lines"),
            RecordFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// Detect record format from a file path.
pub fn detect_format_from_path(path: impl AsRef<Path>) -> Result<RecordFormat> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jsonl" => Ok(RecordFormat::Jsonl),
        "csv" => Ok(RecordFormat::Csv),
        _ => Err(Error::UnsupportedFormat(format!(
            "{} (expected .jsonl or .csv)",
            path.display()
        ))),
    }
}

/// Reads a record file; records without an id get a derived one.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let mut records = match detect_format_from_path(path)? {
        RecordFormat::Jsonl => read_jsonl(path)?,
        RecordFormat::Csv => read_csv(path)?,
    };
    for record in &mut records {
        record.ensure_id();
    }
    debug!(path = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

/// Writes records in the format implied by the path's extension.
pub fn write_records(path: impl AsRef<Path>, records: &[Record], layout: Layout) -> Result<()> {
    let path = path.as_ref();
    match detect_format_from_path(path)? {
        RecordFormat::Jsonl => write_jsonl(path, records, layout),
        RecordFormat::Csv => write_csv(path, records, layout),
    }
}

// ============================================================================
// Column layouts
// ============================================================================

/// One serialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    PiiType,
    SourcePath,
    SourceType,
    Container,
    Row,
    Col,
    Header,
    BBox,
    Text,
    MaskedText,
}

impl Column {
    /// Field name in files.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::PiiType => "pii_type",
            Column::SourcePath => "source_path",
            Column::SourceType => "source_type",
            Column::Container => "container",
            Column::Row => "row",
            Column::Col => "col",
            Column::Header => "header",
            Column::BBox => "bbox",
            Column::Text => "text",
            Column::MaskedText => "masked_text",
        }
    }

    /// Flat text form used in delimited tables; absent values are empty.
    pub fn text_value(&self, record: &Record) -> String {
        match self {
            Column::Id => record.id.clone(),
            Column::PiiType => record.pii_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
            Column::SourcePath => record.source_path.clone(),
            Column::SourceType => record.source_type.as_str().to_string(),
            Column::Container => record.container.clone(),
            Column::Row => record.row.map(|v| v.to_string()).unwrap_or_default(),
            Column::Col => record.col.map(|v| v.to_string()).unwrap_or_default(),
            Column::Header => record.header.clone(),
            Column::BBox => record.bbox.map(|b| b.signature()).unwrap_or_default(),
            Column::Text => record.text.clone(),
            Column::MaskedText => record.masked_text.clone().unwrap_or_default(),
        }
    }
}

const INTERMEDIATE_COLUMNS: &[Column] = &[
    Column::Id,
    Column::SourcePath,
    Column::SourceType,
    Column::Container,
    Column::Row,
    Column::Col,
    Column::Header,
    Column::BBox,
    Column::Text,
];

const PII_COLUMNS: &[Column] = &[
    Column::Id,
    Column::PiiType,
    Column::SourcePath,
    Column::SourceType,
    Column::Container,
    Column::Row,
    Column::Col,
    Column::Header,
    Column::BBox,
    Column::Text,
];

const MASKED_BOTH_COLUMNS: &[Column] = &[
    Column::Id,
    Column::PiiType,
    Column::SourcePath,
    Column::SourceType,
    Column::Container,
    Column::Row,
    Column::Col,
    Column::Header,
    Column::BBox,
    Column::Text,
    Column::MaskedText,
];

const MASKED_ONLY_COLUMNS: &[Column] = &[
    Column::Id,
    Column::PiiType,
    Column::SourcePath,
    Column::SourceType,
    Column::Container,
    Column::Row,
    Column::Col,
    Column::Header,
    Column::BBox,
    Column::MaskedText,
];

/// Which fixed field set a file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Extractor output (no `pii_type`)
    Intermediate,
    /// Filter output
    Pii,
    /// Masker output in the given shape
    Masked(OutputMode),
}

impl Layout {
    /// Columns in file order.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Layout::Intermediate => INTERMEDIATE_COLUMNS,
            Layout::Pii | Layout::Masked(OutputMode::Replace) => PII_COLUMNS,
            Layout::Masked(OutputMode::Both) => MASKED_BOTH_COLUMNS,
            Layout::Masked(OutputMode::MaskedOnly) => MASKED_ONLY_COLUMNS,
        }
    }
}

/// A record viewed through a layout, serialized as an ordered map.
pub struct RecordRow<'a> {
    pub record: &'a Record,
    pub layout: Layout,
}

impl Serialize for RecordRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let columns = self.layout.columns();
        let r = self.record;
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for column in columns {
            let key = column.name();
            match column {
                Column::Id => map.serialize_entry(key, &r.id)?,
                Column::PiiType => map.serialize_entry(key, &r.pii_type)?,
                Column::SourcePath => map.serialize_entry(key, &r.source_path)?,
                Column::SourceType => map.serialize_entry(key, &r.source_type)?,
                Column::Container => map.serialize_entry(key, &r.container)?,
                Column::Row => map.serialize_entry(key, &r.row)?,
                Column::Col => map.serialize_entry(key, &r.col)?,
                Column::Header => map.serialize_entry(key, &r.header)?,
                Column::BBox => map.serialize_entry(key, &r.bbox)?,
                Column::Text => map.serialize_entry(key, &r.text)?,
                Column::MaskedText => map.serialize_entry(key, &r.masked_text)?,
            }
        }
        map.end()
    }
}

// ============================================================================
// Output naming
// ============================================================================

/// Derives an output prefix: extension removed, then a trailing `.{tag}`.
///
/// `out/staff.intermediate.jsonl` with tag `intermediate` becomes
/// `out/staff`.
pub fn output_prefix(input: impl AsRef<Path>, tag: &str) -> String {
    let stem = input.as_ref().with_extension("");
    let stem = stem.to_string_lossy();
    let suffix = format!(".{}", tag);
    stem.strip_suffix(suffix.as_str())
        .unwrap_or(&stem)
        .to_string()
}

/// `{prefix}.{tag}.{ext}`.
pub fn output_path(prefix: &str, tag: &str, format: RecordFormat) -> PathBuf {
    PathBuf::from(format!("{}.{}.{}", prefix, tag, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, PiiType, SourceType};

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format_from_path("a.jsonl").unwrap(), RecordFormat::Jsonl);
        assert_eq!(detect_format_from_path("A.PII.CSV").unwrap(), RecordFormat::Csv);
        assert!(matches!(
            detect_format_from_path("a.xlsx"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(detect_format_from_path("noext").is_err());
    }

    #[test]
    fn test_output_prefix() {
        assert_eq!(output_prefix("out/staff.intermediate.jsonl", "intermediate"), "out/staff");
        assert_eq!(output_prefix("out/staff.pii.csv", "pii"), "out/staff");
        assert_eq!(output_prefix("plain.csv", "pii"), "plain");
        assert_eq!(
            output_path("out/staff", "masked_only", RecordFormat::Csv),
            PathBuf::from("out/staff.masked_only.csv")
        );
    }

    #[test]
    fn test_layout_columns() {
        let names = |l: Layout| l.columns().iter().map(|c| c.name()).collect::<Vec<_>>();
        assert!(!names(Layout::Intermediate).contains(&"pii_type"));
        assert_eq!(names(Layout::Masked(OutputMode::Both)).last(), Some(&"masked_text"));
        assert!(!names(Layout::Masked(OutputMode::MaskedOnly)).contains(&"text"));
        assert!(!names(Layout::Masked(OutputMode::Replace)).contains(&"masked_text"));
    }

    #[test]
    fn test_record_row_json_order() {
        let rec = Record::new(SourceType::PdfText, "홍길동")
            .with_id("r1")
            .with_container("page=1")
            .with_bbox(BBox::new(1.0, 2.0, 3.0, 4.0))
            .with_pii_type(PiiType::Name);
        let row = RecordRow {
            record: &rec,
            layout: Layout::Pii,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.starts_with(r#"{"id":"r1","pii_type":"name","source_path":"""#));
        assert!(json.contains(r#""row":null"#));
        assert!(json.contains(r#""bbox":[1.0,2.0,3.0,4.0]"#));
    }

    #[test]
    fn test_text_values() {
        let rec = Record::new(SourceType::Xlsx, "x").with_position(3, 4);
        assert_eq!(Column::Row.text_value(&rec), "3");
        assert_eq!(Column::BBox.text_value(&rec), "");
        assert_eq!(Column::PiiType.text_value(&rec), "");
        assert_eq!(Column::SourceType.text_value(&rec), "xlsx");
    }
}
