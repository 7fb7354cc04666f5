//! XLSX workbook access for mask write-back.
//!
//! Structure:
//! - `xl/workbook.xml` - sheet names and relationship ids
//! - `xl/_rels/workbook.xml.rels` - relationship id to part path
//! - `xl/sharedStrings.xml` - shared string table (optional)
//! - `xl/worksheets/sheetN.xml` - cell data
//!
//! Only cell values are touched; every other part is copied as-is.

mod container;
mod shared_strings;
mod sheet;

pub use container::Workbook;
pub use shared_strings::parse_shared_strings;
pub use sheet::{
    column_index, column_letters, parse_cell_ref, read_cell_values, rewrite_cells, CellValues,
};

#[cfg(test)]
pub(crate) use container::tests::build_workbook;

use quick_xml::events::{BytesEnd, BytesStart};

/// Local (prefix-free) element name.
fn get_local_name(e: &BytesStart) -> String {
    std::str::from_utf8(e.local_name().as_ref())
        .unwrap_or("")
        .to_string()
}

fn get_local_name_end(e: &BytesEnd) -> String {
    std::str::from_utf8(e.local_name().as_ref())
        .unwrap_or("")
        .to_string()
}

/// Gets a string attribute value, matching on the local attribute name.
fn get_attr_string(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            if let Ok(val) = attr.unescape_value() {
                return Some(val.into_owned());
            }
        }
    }
    None
}
