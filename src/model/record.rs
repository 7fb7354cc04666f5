//! The universal record flowing through the pipeline.

use super::{BBox, CellKey, PiiType, SourceType};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Number of leading text characters folded into a derived id.
const ID_TEXT_PREFIX: usize = 50;

/// Number of hex characters kept from the id digest.
const ID_HEX_LEN: usize = 16;

/// One extracted cell, token or synthetic line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier; derived from content when the extractor left it empty
    #[serde(default, deserialize_with = "string_or_null")]
    pub id: String,
    /// Assigned by the classifier
    #[serde(default, deserialize_with = "pii_type_or_blank")]
    pub pii_type: Option<PiiType>,
    /// Absolute path of the originating document
    #[serde(default, deserialize_with = "string_or_null")]
    pub source_path: String,
    /// Extraction origin
    pub source_type: SourceType,
    /// Sheet name or `page=N[,table_M]`
    #[serde(default, deserialize_with = "string_or_null")]
    pub container: String,
    /// 1-based row (xlsx, pdf_table)
    #[serde(default, deserialize_with = "position")]
    pub row: Option<i64>,
    /// 1-based column (xlsx, pdf_table)
    #[serde(default, deserialize_with = "position")]
    pub col: Option<i64>,
    /// Column or field label, empty when none
    #[serde(default, deserialize_with = "string_or_null")]
    pub header: String,
    /// Token geometry (pdf_text only)
    #[serde(default)]
    pub bbox: Option<BBox>,
    /// Raw value
    #[serde(default, deserialize_with = "string_or_null")]
    pub text: String,
    /// Assigned by the masker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_text: Option<String>,
}

impl Record {
    /// Creates a record with the given origin and value; all other fields empty.
    pub fn new(source_type: SourceType, text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            pii_type: None,
            source_path: String::new(),
            source_type,
            container: String::new(),
            row: None,
            col: None,
            header: String::new(),
            bbox: None,
            text: text.into(),
            masked_text: None,
        }
    }

    /// Sets the source path.
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Sets the container (sheet or page reference).
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Sets the 1-based cell position.
    pub fn with_position(mut self, row: i64, col: i64) -> Self {
        self.row = Some(row);
        self.col = Some(col);
        self
    }

    /// Sets the header label.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Sets the bounding box.
    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Sets an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the PII category.
    pub fn with_pii_type(mut self, pii_type: PiiType) -> Self {
        self.pii_type = Some(pii_type);
        self
    }

    /// Returns the location key when both row and col are present.
    pub fn cell_key(&self) -> Option<CellKey> {
        CellKey::from_record(self)
    }

    /// Computes the content-derived id for this record.
    ///
    /// The digest covers source path, source type, container, position,
    /// bbox origin and the first 50 characters of the text.
    pub fn derived_id(&self) -> String {
        let prefix: String = self.text.chars().take(ID_TEXT_PREFIX).collect();
        let parts = [
            self.source_path.clone(),
            self.source_type.as_str().to_string(),
            self.container.clone(),
            opt_to_string(self.row),
            opt_to_string(self.col),
            self.bbox.map(|b| b.x0.to_string()).unwrap_or_default(),
            self.bbox.map(|b| b.top.to_string()).unwrap_or_default(),
            prefix,
        ];

        let mut hasher = Sha256::new();
        hasher.update(parts.join("||").as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..ID_HEX_LEN].to_string()
    }

    /// Assigns a derived id if the record has none.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = self.derived_id();
        }
    }

    /// Identity used by the integrity check; falls back to a composite key.
    pub fn identity(&self) -> String {
        if !self.id.is_empty() {
            return self.id.clone();
        }
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.source_path,
            self.container,
            opt_to_string(self.row),
            opt_to_string(self.col),
            self.pii_type.map(|t| t.as_str()).unwrap_or(""),
            self.text
        )
    }
}

fn opt_to_string(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn pii_type_or_blank<'de, D>(deserializer: D) -> Result<Option<PiiType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    parse_pii_type(&raw).map_err(serde::de::Error::custom)
}

fn position<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Float(v)) if v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(Raw::Float(v)) => Err(serde::de::Error::custom(format!(
            "position {} is not an integer",
            v
        ))),
        Some(Raw::Text(s)) => parse_position(&s).map_err(serde::de::Error::custom),
    }
}

/// Parses a textual position; blank and `None` mean absent.
pub fn parse_position(raw: &str) -> Result<Option<i64>, String> {
    let s = raw.trim();
    if s.is_empty() || s == "None" || s == "null" {
        return Ok(None);
    }
    if let Ok(v) = s.parse::<i64>() {
        return Ok(Some(v));
    }
    match s.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(format!("'{}' is not an integer position", s)),
    }
}

/// Parses a textual PII category; blank means unclassified.
pub fn parse_pii_type(raw: &str) -> Result<Option<PiiType>, String> {
    let s = raw.trim();
    if s.is_empty() || s == "None" || s == "null" {
        return Ok(None);
    }
    s.parse::<PiiType>().map(Some)
}
