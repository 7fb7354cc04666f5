//! Shared string table parsing.

use super::{get_local_name, get_local_name_end};
use crate::error::Result;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Parses `xl/sharedStrings.xml` into the ordered string table.
///
/// Rich-text runs are concatenated; phonetic hints (`rPh`) are skipped.
pub fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut buf = Vec::new();

    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match get_local_name(&e).as_str() {
                "si" => current = Some(String::new()),
                "rPh" => phonetic_depth += 1,
                "t" => in_text = phonetic_depth == 0,
                _ => {}
            },
            Event::Empty(e) => {
                if get_local_name(&e) == "si" {
                    strings.push(String::new());
                }
            }
            Event::Text(t) => {
                if in_text {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&t.unescape()?);
                    }
                }
            }
            Event::CData(t) => {
                if in_text {
                    if let Some(s) = current.as_mut() {
                        s.push_str(std::str::from_utf8(&t)?);
                    }
                }
            }
            Event::End(e) => match get_local_name_end(&e).as_str() {
                "si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                "rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                "t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}
