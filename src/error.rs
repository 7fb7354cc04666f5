//! Error types for piimask library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for piimask operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for piimask library.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input file extension is not a supported record format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A structured field (bbox, row, col, enum value) could not be parsed.
    #[error("Malformed field '{field}' at line {line}: {message}")]
    MalformedField {
        field: &'static str,
        line: usize,
        message: String,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited-table encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(String),

    /// ZIP archive error while reading or writing a workbook.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// XML parsing error in a workbook part.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Required workbook part is missing.
    #[error("Missing required component: {0}")]
    MissingComponent(String),

    /// Invalid option combination or selector.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The masking stage emitted a different number of records than it received.
    ///
    /// This indicates a defect, never a user error.
    #[error("Masking produced {output} records from {input} input records")]
    RowCountMismatch { input: usize, output: usize },

    /// A batch run discovered no valid inputs.
    #[error("No valid inputs found")]
    EmptyBatch,

    /// A batch run stopped at the first failing document.
    #[error("Batch aborted at {path}: {message}")]
    BatchAborted { path: PathBuf, message: String },
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err.to_string())
    }
}

#[cfg(feature = "xlsx")]
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

#[cfg(feature = "xlsx")]
impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

#[cfg(feature = "xlsx")]
impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl Error {
    /// Returns the error message followed by every underlying source.
    pub fn trace(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }
}
