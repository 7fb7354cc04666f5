//! JSON lines reader and writer.

use super::{Layout, RecordRow};
use crate::error::{Error, Result};
use crate::model::Record;
use serde::Serialize;
use serde_json::error::Category;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Reads one record per non-blank line.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Record>(trimmed).map_err(|e| match e.classify() {
            Category::Data => Error::MalformedField {
                field: "record",
                line: index + 1,
                message: e.to_string(),
            },
            _ => Error::Json(e),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Writes records through the given layout, one object per line.
pub fn write_jsonl(path: impl AsRef<Path>, records: &[Record], layout: Layout) -> Result<()> {
    write_jsonl_items(path, records.iter().map(|record| RecordRow { record, layout }))
}

/// Writes any serializable items, one object per line.
pub fn write_jsonl_items<T, I>(path: impl AsRef<Path>, items: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, &item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
