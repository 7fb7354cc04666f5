//! Worksheet cell access.
//!
//! Cells are addressed by 1-based `(row, col)`. Reading resolves every
//! stored cell to its text form; rewriting streams the worksheet XML,
//! replacing targeted `<c>` elements and inserting missing ones.

use super::{get_attr_string, get_local_name, get_local_name_end};
use crate::error::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

/// Current text of every stored cell, keyed by `(row, col)`.
pub type CellValues = HashMap<(i64, i64), String>;

/// Converts column letters to a 1-based index (`A` = 1, `AA` = 27).
pub fn column_index(letters: &str) -> Option<i64> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.bytes().try_fold(0i64, |acc, b| {
        b.is_ascii_alphabetic()
            .then(|| acc * 26 + i64::from(b.to_ascii_uppercase() - b'A' + 1))
    })
}

/// Parses an A1-style reference (`B12`, `$C$3`) into `(row, col)`.
pub fn parse_cell_ref(reference: &str) -> Option<(i64, i64)> {
    let s = reference.replace('$', "");
    let split = s.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = s.split_at(split);
    let col = column_index(letters)?;
    let row = digits.parse::<i64>().ok().filter(|&r| r >= 1)?;
    Some((row, col))
}

/// Tracks the position of cells, including ones stored without `r`.
#[derive(Default)]
struct Position {
    row: i64,
    col: i64,
}

impl Position {
    fn enter_row(&mut self, e: &BytesStart) {
        self.row = get_attr_string(e, "r")
            .and_then(|r| r.parse().ok())
            .unwrap_or(self.row + 1);
        self.col = 0;
    }

    fn enter_cell(&mut self, e: &BytesStart) -> (i64, i64) {
        match get_attr_string(e, "r").and_then(|r| parse_cell_ref(&r)) {
            Some((row, col)) => {
                self.row = row;
                self.col = col;
            }
            None => self.col += 1,
        }
        (self.row, self.col)
    }
}

/// Reads the text form of every stored cell in a worksheet.
///
/// Shared strings are resolved through `shared`; inline and formula strings,
/// numbers and errors keep their stored text; booleans read `TRUE`/`FALSE`.
pub fn read_cell_values(xml: &str, shared: &[String]) -> Result<CellValues> {
    let mut reader = Reader::from_str(xml);
    let mut values = CellValues::new();
    let mut pos = Position::default();
    let mut buf = Vec::new();

    // Per-cell state
    let mut current: Option<((i64, i64), String)> = None;
    let mut raw = String::new();
    let mut collecting = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match get_local_name(&e).as_str() {
                "row" => pos.enter_row(&e),
                "c" => {
                    let at = pos.enter_cell(&e);
                    current = Some((at, get_attr_string(&e, "t").unwrap_or_default()));
                    raw.clear();
                }
                "v" | "t" if current.is_some() => collecting = true,
                _ => {}
            },
            Event::Empty(e) => match get_local_name(&e).as_str() {
                "row" => pos.enter_row(&e),
                "c" => {
                    let at = pos.enter_cell(&e);
                    values.insert(at, String::new());
                }
                _ => {}
            },
            Event::Text(t) if collecting => raw.push_str(&t.unescape()?),
            Event::End(e) => match get_local_name_end(&e).as_str() {
                "v" | "t" => collecting = false,
                "c" => {
                    if let Some((at, kind)) = current.take() {
                        values.insert(at, resolve_value(&kind, &raw, shared));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(values)
}

fn resolve_value(kind: &str, raw: &str, shared: &[String]) -> String {
    match kind {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .cloned()
            .unwrap_or_default(),
        "b" => match raw.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Replacements not yet written, by row then column.
struct Pending<'a> {
    rows: BTreeMap<i64, BTreeMap<i64, &'a str>>,
}

impl<'a> Pending<'a> {
    fn new(replacements: &'a HashMap<(i64, i64), String>) -> Self {
        let mut rows: BTreeMap<i64, BTreeMap<i64, &'a str>> = BTreeMap::new();
        for (&(row, col), value) in replacements {
            rows.entry(row).or_default().insert(col, value.as_str());
        }
        Self { rows }
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn take(&mut self, (row, col): (i64, i64)) -> Option<&'a str> {
        let cells = self.rows.get_mut(&row)?;
        let value = cells.remove(&col);
        if cells.is_empty() {
            self.rows.remove(&row);
        }
        value
    }

    /// Cells of `row` left of `col`; they are absent from the sheet.
    fn take_cells_before(&mut self, row: i64, col: i64) -> BTreeMap<i64, &'a str> {
        let Some(cells) = self.rows.get_mut(&row) else {
            return BTreeMap::new();
        };
        let rest = cells.split_off(&col);
        let before = std::mem::replace(cells, rest);
        if cells.is_empty() {
            self.rows.remove(&row);
        }
        before
    }

    fn take_row(&mut self, row: i64) -> BTreeMap<i64, &'a str> {
        self.rows.remove(&row).unwrap_or_default()
    }

    /// Rows above `row`; they are absent from the sheet.
    fn take_rows_before(&mut self, row: i64) -> BTreeMap<i64, BTreeMap<i64, &'a str>> {
        let rest = self.rows.split_off(&row);
        std::mem::replace(&mut self.rows, rest)
    }

    fn take_all(&mut self) -> BTreeMap<i64, BTreeMap<i64, &'a str>> {
        std::mem::take(&mut self.rows)
    }
}

/// Rewrites a worksheet, replacing targeted cells with inline strings.
///
/// Replaced cells keep their reference, style and other attributes; the old
/// value, formula and type are discarded. Targets missing from the sheet are
/// created in column order, inside a new `<row>` when the row is missing too.
pub fn rewrite_cells(xml: &str, replacements: &HashMap<(i64, i64), String>) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(xml.len() + 256)));
    let mut pending = Pending::new(replacements);
    let mut pos = Position::default();
    let mut prefix = String::new();
    let mut buf = Vec::new();
    let mut skip = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let replaced = match &event {
            Event::Start(e) if get_local_name(e) == "sheetData" => {
                prefix = name_prefix(e);
                false
            }
            Event::Empty(e) if get_local_name(e) == "sheetData" => {
                prefix = name_prefix(e);
                if pending.is_empty() {
                    false
                } else {
                    write_event(&mut writer, Event::Start(e.clone()))?;
                    write_rows(&mut writer, &prefix, pending.take_all())?;
                    write_event(&mut writer, Event::End(e.to_end().into_owned()))?;
                    true
                }
            }
            Event::Start(e) if get_local_name(e) == "row" => {
                pos.enter_row(e);
                write_rows(&mut writer, &prefix, pending.take_rows_before(pos.row))?;
                false
            }
            Event::Empty(e) if get_local_name(e) == "row" => {
                pos.enter_row(e);
                write_rows(&mut writer, &prefix, pending.take_rows_before(pos.row))?;
                let cells = pending.take_row(pos.row);
                if cells.is_empty() {
                    false
                } else {
                    write_event(&mut writer, Event::Start(e.clone()))?;
                    write_new_cells(&mut writer, &prefix, pos.row, cells)?;
                    write_event(&mut writer, Event::End(e.to_end().into_owned()))?;
                    true
                }
            }
            Event::Start(e) if get_local_name(e) == "c" => {
                let at = pos.enter_cell(e);
                write_new_cells(&mut writer, &prefix, at.0, pending.take_cells_before(at.0, at.1))?;
                match pending.take(at) {
                    Some(value) => {
                        write_inline_cell(&mut writer, e, value)?;
                        // Drop the old value, formula and inline string
                        let end = e.to_end().into_owned();
                        reader.read_to_end_into(end.name(), &mut skip)?;
                        skip.clear();
                        true
                    }
                    None => false,
                }
            }
            Event::Empty(e) if get_local_name(e) == "c" => {
                let at = pos.enter_cell(e);
                write_new_cells(&mut writer, &prefix, at.0, pending.take_cells_before(at.0, at.1))?;
                match pending.take(at) {
                    Some(value) => {
                        write_inline_cell(&mut writer, e, value)?;
                        true
                    }
                    None => false,
                }
            }
            Event::End(e) if get_local_name_end(e) == "row" => {
                write_new_cells(&mut writer, &prefix, pos.row, pending.take_row(pos.row))?;
                false
            }
            Event::End(e) if get_local_name_end(e) == "sheetData" => {
                write_rows(&mut writer, &prefix, pending.take_all())?;
                false
            }
            Event::Eof => break,
            _ => false,
        };
        if !replaced {
            write_event(&mut writer, event)?;
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

/// Converts a 1-based column index to letters (`27` = `AA`).
pub fn column_letters(col: i64) -> String {
    let mut letters = String::new();
    let mut n = col;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.insert(0, char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters
}

/// Namespace prefix of an element, with its colon (`x:`), or empty.
fn name_prefix(e: &BytesStart) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::XmlParse(e.to_string()))
}

fn write_rows(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    prefix: &str,
    rows: BTreeMap<i64, BTreeMap<i64, &str>>,
) -> Result<()> {
    for (row, cells) in rows {
        let tag = format!("{}row", prefix);
        let mut start = BytesStart::new(tag.clone());
        start.push_attribute(("r", row.to_string().as_str()));
        write_event(writer, Event::Start(start))?;
        write_new_cells(writer, prefix, row, cells)?;
        write_event(writer, Event::End(BytesEnd::new(tag)))?;
    }
    Ok(())
}

fn write_new_cells(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    prefix: &str,
    row: i64,
    cells: BTreeMap<i64, &str>,
) -> Result<()> {
    for (col, value) in cells {
        let reference = format!("{}{}", column_letters(col), row);
        let mut cell = BytesStart::new(format!("{}c", prefix));
        cell.push_attribute(("r", reference.as_str()));
        write_inline_cell(writer, &cell, value)?;
    }
    Ok(())
}

fn write_inline_cell(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    original: &BytesStart,
    value: &str,
) -> Result<()> {
    let prefix = name_prefix(original);
    let tag = |local: &str| format!("{}{}", prefix, local);

    let mut cell = BytesStart::new(tag("c"));
    for attr in original.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() != b"t" {
            cell.push_attribute(attr);
        }
    }
    cell.push_attribute(("t", "inlineStr"));

    let mut text = BytesStart::new(tag("t"));
    text.push_attribute(("xml:space", "preserve"));

    let events = [
        Event::Start(cell),
        Event::Start(BytesStart::new(tag("is"))),
        Event::Start(text),
        Event::Text(BytesText::new(value)),
        Event::End(BytesEnd::new(tag("t"))),
        Event::End(BytesEnd::new(tag("is"))),
        Event::End(BytesEnd::new(tag("c"))),
    ];
    for event in events {
        write_event(writer, event)?;
    }
    Ok(())
}
