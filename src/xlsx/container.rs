//! ZIP container wrapper for XLSX workbooks.

use super::{get_attr_string, get_local_name, parse_shared_strings};
use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// XLSX container paths.
mod paths {
    pub const WORKBOOK_XML: &str = "xl/workbook.xml";
    pub const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
    pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
    pub const XL_DIR: &str = "xl/";
}

/// A worksheet listed in the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetEntry {
    name: String,
    path: String,
}

/// ZIP container wrapper for XLSX files.
pub struct Workbook {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
}

impl Workbook {
    /// Opens a workbook from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Opens a workbook from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let cursor = Cursor::new(data);
        let mut archive = ZipArchive::new(cursor)?;

        let workbook_xml = read_file(&mut archive, paths::WORKBOOK_XML)?;
        let rels_xml = read_file(&mut archive, paths::WORKBOOK_RELS)?;
        let sheets = parse_sheet_entries(&workbook_xml, &rels_xml)?;

        let shared_strings = match read_file(&mut archive, paths::SHARED_STRINGS) {
            Ok(xml) => parse_shared_strings(&xml)?,
            Err(Error::MissingComponent(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            archive,
            sheets,
            shared_strings,
        })
    }

    /// Returns true if the workbook has a sheet with this exact name.
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    /// Archive path of the named sheet.
    pub fn sheet_path(&self, name: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.path.as_str())
    }

    /// The shared string table.
    pub fn shared_strings(&self) -> &[String] {
        &self.shared_strings
    }

    /// Reads a file from the archive as UTF-8 string.
    pub fn read_file(&mut self, path: &str) -> Result<String> {
        read_file(&mut self.archive, path)
    }

    /// Reads the XML of the named sheet.
    pub fn read_sheet(&mut self, name: &str) -> Result<String> {
        let path = self
            .sheet_path(name)
            .ok_or_else(|| Error::MissingComponent(format!("sheet '{}'", name)))?
            .to_string();
        self.read_file(&path)
    }

    /// Builds a new archive with some parts replaced; everything else is
    /// copied without recompression.
    pub fn to_bytes_with(&mut self, replaced: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..self.archive.len() {
            let name = self.archive.by_index_raw(i)?.name().to_string();
            match replaced.get(&name) {
                Some(data) => {
                    writer.start_file(name, options)?;
                    writer.write_all(data)?;
                }
                None => {
                    let file = self.archive.by_index_raw(i)?;
                    writer.raw_copy_file(file)?;
                }
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn read_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|_| Error::MissingComponent(path.to_string()))?;

    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Resolves sheet names to part paths through the workbook relationships.
fn parse_sheet_entries(workbook_xml: &str, rels_xml: &str) -> Result<Vec<SheetEntry>> {
    let targets = parse_relationships(rels_xml)?;

    let mut reader = Reader::from_str(workbook_xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if get_local_name(&e) == "sheet" => {
                let name = get_attr_string(&e, "name").unwrap_or_default();
                let target = get_attr_string(&e, "id").and_then(|id| targets.get(&id).cloned());
                if let Some(target) = target {
                    sheets.push(SheetEntry {
                        name,
                        path: resolve_target(&target),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if sheets.is_empty() {
        return Err(Error::MissingComponent("worksheets".into()));
    }
    Ok(sheets)
}

/// Relationship id to target, for worksheet relationships.
fn parse_relationships(rels_xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(rels_xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if get_local_name(&e) == "Relationship" => {
                if let (Some(id), Some(target)) =
                    (get_attr_string(&e, "Id"), get_attr_string(&e, "Target"))
                {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Targets are relative to `xl/` unless absolute within the package.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", paths::XL_DIR, target.trim_start_matches("./")),
    }
}
