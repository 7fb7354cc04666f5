//! Delimited-table (CSV) reader and writer.
//!
//! Every cell is text: positions are plain integers or empty and the bbox is
//! a JSON array string or empty. Columns are located by header name, so
//! files with extra or reordered columns still load.

use super::{Column, Layout};
use crate::error::{Error, Result};
use crate::model::{parse_pii_type, parse_position, BBox, Record, SourceType};
use std::collections::HashMap;
use std::path::Path;

/// Column positions found in a header row.
struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(headers: &csv::StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('\u{FEFF}').to_string(), i))
            .collect();
        Self { positions }
    }

    fn get<'r>(&self, row: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        self.positions.get(column.name()).and_then(|&i| row.get(i))
    }
}

/// Reads a CSV record file with a header row.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let index = HeaderIndex::new(reader.headers()?);
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line() as usize).unwrap_or(0);
        records.push(parse_row(&index, &row, line)?);
    }

    Ok(records)
}

fn parse_row(index: &HeaderIndex, row: &csv::StringRecord, line: usize) -> Result<Record> {
    let text = |column: Column| index.get(row, column).unwrap_or("").to_string();
    let malformed = |field: &'static str, message: String| Error::MalformedField {
        field,
        line,
        message,
    };

    let source_type = text(Column::SourceType)
        .trim()
        .parse::<SourceType>()
        .map_err(|m| malformed("source_type", m))?;

    let mut record = Record::new(source_type, text(Column::Text))
        .with_id(text(Column::Id))
        .with_source_path(text(Column::SourcePath))
        .with_container(text(Column::Container))
        .with_header(text(Column::Header));

    record.pii_type = parse_pii_type(&text(Column::PiiType)).map_err(|m| malformed("pii_type", m))?;
    record.row = parse_position(&text(Column::Row)).map_err(|m| malformed("row", m))?;
    record.col = parse_position(&text(Column::Col)).map_err(|m| malformed("col", m))?;
    record.bbox = parse_bbox(&text(Column::BBox)).map_err(|m| malformed("bbox", m))?;
    record.masked_text = index.get(row, Column::MaskedText).map(str::to_string);

    Ok(record)
}

fn parse_bbox(raw: &str) -> std::result::Result<Option<BBox>, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<BBox>>(s).map_err(|e| format!("'{}': {}", s, e))
}

/// Writes records through the given layout with a header row.
pub fn write_csv(path: impl AsRef<Path>, records: &[Record], layout: Layout) -> Result<()> {
    let columns = layout.columns();
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(columns.iter().map(|c| c.name()))?;
    for record in records {
        writer.write_record(columns.iter().map(|c| c.text_value(record)))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::OutputMode;
    use crate::model::PiiType;
    use std::fs;

    #[test]
    fn test_read_csv_with_bbox_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.intermediate.csv");
        fs::write(
            &path,
            "id,source_path,source_type,container,row,col,header,bbox,text\n\
             a1,/d/a.pdf,pdf_text,page=1,,,,\"[10.0, 20.5, 30.0, 28.0]\",홍길동\n\
             a2,/d/a.xlsx,xlsx,Sheet1,2,3,연락처,,010-1234-5678\n",
        )
        .unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bbox, Some(BBox::new(10.0, 20.5, 30.0, 28.0)));
        assert_eq!(records[0].row, None);
        assert!(records[0].pii_type.is_none());
        assert_eq!(records[1].cell_key().unwrap().col, 3);
        assert_eq!(records[1].header, "연락처");
        assert!(records[1].masked_text.is_none());
    }

    #[test]
    fn test_malformed_bbox_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "id,source_type,bbox,text\nx,pdf_text,\"[1,2\",a\n",
        )
        .unwrap();

        match read_csv(&path) {
            Err(Error::MalformedField { field, line, .. }) => {
                assert_eq!(field, "bbox");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_source_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "id,source_type,text\nx,docx,a\n").unwrap();
        assert!(matches!(
            read_csv(&path),
            Err(Error::MalformedField { field: "source_type", .. })
        ));
    }

    #[test]
    fn test_written_masked_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.masked.csv");
        let mut rec = Record::new(SourceType::Xlsx, "홍길동, 외")
            .with_id("r1")
            .with_source_path("/d/a.xlsx")
            .with_container("Sheet1")
            .with_position(2, 1)
            .with_pii_type(PiiType::Name);
        rec.masked_text = Some("홍*동".into());

        write_csv(&path, std::slice::from_ref(&rec), Layout::Masked(OutputMode::Both)).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "id,pii_type,source_path,source_type,container,row,col,header,bbox,text,masked_text\n"
        ));
        assert!(content.contains("\"홍길동, 외\""));

        let back = read_csv(&path).unwrap();
        assert_eq!(back, vec![rec]);
    }
}
