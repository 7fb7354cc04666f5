//! Location key and classification context.

use super::{Record, SourceType};

/// Composite key addressing one document cell.
///
/// Shared by location-based deduplication and workbook write-back, so both
/// stages agree on what "the same cell" means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub source_path: String,
    pub container: String,
    pub row: i64,
    pub col: i64,
}

impl CellKey {
    /// Creates a cell key.
    pub fn new(source_path: impl Into<String>, container: impl Into<String>, row: i64, col: i64) -> Self {
        Self {
            source_path: source_path.into(),
            container: container.into(),
            row,
            col,
        }
    }

    /// Builds the key from a record; `None` when row or col is absent.
    pub fn from_record(record: &Record) -> Option<Self> {
        match (record.row, record.col) {
            (Some(row), Some(col)) => Some(Self::new(
                record.source_path.clone(),
                record.container.clone(),
                row,
                col,
            )),
            _ => None,
        }
    }

    /// Returns true if both coordinates are usable 1-based indices.
    pub fn is_addressable(&self) -> bool {
        self.row >= 1 && self.col >= 1
    }
}

/// The fixed-shape context the classifier sees alongside the text.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub header: &'a str,
    pub container: &'a str,
    pub source_type: SourceType,
}

impl<'a> Context<'a> {
    /// Creates a context with only a header label.
    pub fn with_header(header: &'a str, source_type: SourceType) -> Self {
        Self {
            header,
            container: "",
            source_type,
        }
    }
}

impl<'a> From<&'a Record> for Context<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            header: &record.header,
            container: &record.container,
            source_type: record.source_type,
        }
    }
}
