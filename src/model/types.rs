//! Closed enumerations and geometry used by records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Spreadsheet cell
    Xlsx,
    /// PDF text token with a bounding box
    PdfText,
    /// PDF table cell
    PdfTable,
    /// Synthetic line built from `PdfText` tokens
    PdfLine,
}

impl SourceType {
    /// Wire name of this source type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Xlsx => "xlsx",
            SourceType::PdfText => "pdf_text",
            SourceType::PdfTable => "pdf_table",
            SourceType::PdfLine => "pdf_line",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Ok(SourceType::Xlsx),
            "pdf_text" => Ok(SourceType::PdfText),
            "pdf_table" => Ok(SourceType::PdfTable),
            "pdf_line" => Ok(SourceType::PdfLine),
            other => Err(format!("unknown source type '{}'", other)),
        }
    }
}

/// The eight recognised PII categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Name,
    Passport,
    DriverLicense,
    Rrn,
    Address,
    Email,
    Phone,
    Card,
}

impl PiiType {
    /// All categories, in declaration order.
    pub const ALL: [PiiType; 8] = [
        PiiType::Name,
        PiiType::Passport,
        PiiType::DriverLicense,
        PiiType::Rrn,
        PiiType::Address,
        PiiType::Email,
        PiiType::Phone,
        PiiType::Card,
    ];

    /// Wire name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Name => "name",
            PiiType::Passport => "passport",
            PiiType::DriverLicense => "driver_license",
            PiiType::Rrn => "rrn",
            PiiType::Address => "address",
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::Card => "card",
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        PiiType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown pii type '{}'", s))
    }
}

/// Bounding box of a PDF text token: (x0, top, x1, bottom).
///
/// Serialized as a four-element JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    /// Creates a bounding box.
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self { x0, top, x1, bottom }
    }

    /// Deterministic JSON signature used for key equality.
    pub fn signature(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<[f64; 4]> for BBox {
    fn from(q: [f64; 4]) -> Self {
        Self::new(q[0], q[1], q[2], q[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.top, b.x1, b.bottom]
    }
}
