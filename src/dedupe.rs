//! Deduplication policies.
//!
//! Each record maps to a [`DedupeKey`] under the selected [`DedupeMode`].
//! A [`DedupeSet`] remembers every key admitted during one filter run and
//! rejects later records that produce a key it has already seen.

use crate::model::{CellKey, PiiType, Record};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Policy used to decide whether two detections are the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DedupeMode {
    /// Every record is unique
    None,
    /// Same non-empty id
    ById,
    /// Same cell and PII type (default)
    #[default]
    ByLocation,
    /// Same type, origin, header, text and geometry
    ByText,
}

impl DedupeMode {
    /// Returns the option name used in configuration and drop reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupeMode::None => "none",
            DedupeMode::ById => "by_id",
            DedupeMode::ByLocation => "by_location",
            DedupeMode::ByText => "by_text",
        }
    }
}

impl fmt::Display for DedupeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DedupeMode::None),
            "by_id" => Ok(DedupeMode::ById),
            "by_location" => Ok(DedupeMode::ByLocation),
            "by_text" => Ok(DedupeMode::ByText),
            other => Err(format!("unknown dedupe mode '{}'", other)),
        }
    }
}

/// Identity of a detection under some [`DedupeMode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    /// Never equal to any other key
    Ephemeral(u64),
    /// Record id
    Id(String),
    /// Cell position plus category
    Location(CellKey, Option<PiiType>),
    /// Content fallback
    Text {
        pii_type: Option<PiiType>,
        source_path: String,
        container: String,
        header: String,
        text: String,
        bbox: String,
    },
}

impl DedupeKey {
    /// Content fallback key shared by every mode.
    pub fn text_fallback(record: &Record) -> Self {
        DedupeKey::Text {
            pii_type: record.pii_type,
            source_path: record.source_path.clone(),
            container: record.container.clone(),
            header: record.header.clone(),
            text: record.text.clone(),
            bbox: record.bbox.map(|b| b.signature()).unwrap_or_default(),
        }
    }
}

/// Keys admitted so far within one filter invocation.
#[derive(Debug, Default)]
pub struct DedupeSet {
    mode: DedupeMode,
    seen: HashSet<DedupeKey>,
    counter: u64,
}

impl DedupeSet {
    /// Creates an empty set for the given policy.
    pub fn new(mode: DedupeMode) -> Self {
        Self {
            mode,
            seen: HashSet::new(),
            counter: 0,
        }
    }

    /// Returns the active policy.
    pub fn mode(&self) -> DedupeMode {
        self.mode
    }

    /// Computes the key for a record under this set's policy.
    pub fn key(&mut self, record: &Record) -> DedupeKey {
        match self.mode {
            DedupeMode::None => {
                self.counter += 1;
                DedupeKey::Ephemeral(self.counter)
            }
            mode => dedupe_key(record, mode),
        }
    }

    /// Admits the record; returns false if an equal key was already seen.
    pub fn admit(&mut self, record: &Record) -> bool {
        let key = self.key(record);
        self.seen.insert(key)
    }

    /// Number of distinct keys admitted.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing was admitted yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Computes the dedupe key for a record.
///
/// [`DedupeMode::None`] has no stable key; a fresh [`DedupeKey::Ephemeral`]
/// with value zero is returned here, and [`DedupeSet`] numbers them.
pub fn dedupe_key(record: &Record, mode: DedupeMode) -> DedupeKey {
    match mode {
        DedupeMode::None => DedupeKey::Ephemeral(0),
        DedupeMode::ById if !record.id.is_empty() => DedupeKey::Id(record.id.clone()),
        DedupeMode::ByLocation => match record.cell_key() {
            Some(cell) => DedupeKey::Location(cell, record.pii_type),
            None => DedupeKey::text_fallback(record),
        },
        _ => DedupeKey::text_fallback(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, SourceType};

    fn cell(row: i64, col: i64, text: &str) -> Record {
        Record::new(SourceType::Xlsx, text)
            .with_source_path("/a.xlsx")
            .with_container("Sheet1")
            .with_position(row, col)
            .with_pii_type(PiiType::Name)
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("by_id".parse::<DedupeMode>().unwrap(), DedupeMode::ById);
        assert_eq!("BY_TEXT".parse::<DedupeMode>().unwrap(), DedupeMode::ByText);
        assert_eq!(DedupeMode::default(), DedupeMode::ByLocation);
        assert!("by_page".parse::<DedupeMode>().is_err());
    }

    #[test]
    fn test_by_location_distinct_cells() {
        let mut set = DedupeSet::new(DedupeMode::ByLocation);
        assert!(set.admit(&cell(2, 1, "홍길동")));
        assert!(set.admit(&cell(3, 1, "홍길동")));
        assert!(!set.admit(&cell(2, 1, "김철수")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_by_location_type_is_part_of_key() {
        let mut set = DedupeSet::new(DedupeMode::ByLocation);
        let a = cell(2, 1, "x");
        let b = cell(2, 1, "x").with_pii_type(PiiType::Email);
        assert!(set.admit(&a));
        assert!(set.admit(&b));
    }

    #[test]
    fn test_by_location_falls_back_to_text() {
        let token = |x: f64| {
            Record::new(SourceType::PdfText, "홍길동")
                .with_container("page=1")
                .with_bbox(BBox::new(x, 10.0, x + 5.0, 18.0))
                .with_pii_type(PiiType::Name)
        };
        let mut set = DedupeSet::new(DedupeMode::ByLocation);
        assert!(set.admit(&token(1.0)));
        assert!(set.admit(&token(2.0)));
        assert!(!set.admit(&token(1.0)));
    }

    #[test]
    fn test_by_id_empty_uses_fallback() {
        let mut set = DedupeSet::new(DedupeMode::ById);
        assert!(set.admit(&cell(1, 1, "a").with_id("x")));
        assert!(!set.admit(&cell(2, 2, "b").with_id("x")));
        assert!(set.admit(&cell(1, 1, "a")));
        assert!(!set.admit(&cell(5, 5, "a")));
    }

    #[test]
    fn test_none_keeps_everything() {
        let mut set = DedupeSet::new(DedupeMode::None);
        let rec = cell(1, 1, "a");
        assert!(set.admit(&rec));
        assert!(set.admit(&rec));
        assert!(set.admit(&rec));
    }

    #[test]
    fn test_by_text_ignores_position() {
        let mut set = DedupeSet::new(DedupeMode::ByText);
        assert!(set.admit(&cell(1, 1, "a")));
        assert!(!set.admit(&cell(9, 9, "a")));
        assert!(set.admit(&cell(1, 1, "a").with_header("성명")));
    }
}
