//! Line aggregation for PDF text tokens.
//!
//! Rebuilds logical lines from positioned `pdf_text` tokens so that inline
//! labels such as "성명: 홍길동" can be scanned as one value. The synthetic
//! `pdf_line` records are appended to the stream; token records are kept.

use crate::model::{Record, SourceType};
use crate::normalize::normalize;
use std::collections::HashMap;

/// Default vertical tolerance, in document coordinate units.
pub const DEFAULT_LINE_Y_TOL: f64 = 2.0;

/// A greedy cluster of tokens sharing a baseline.
struct Bucket<'a> {
    y_ref: f64,
    tokens: Vec<&'a Record>,
}

/// Aggregate `pdf_text` tokens into synthetic `pdf_line` records.
///
/// Tokens are grouped per container (page), sorted by `(top, x0)`, and
/// assigned to the first open bucket whose reference y lies within `y_tol`.
/// Each bucket becomes one line with its tokens joined left to right.
pub fn aggregate_lines(records: &[Record], y_tol: f64) -> Vec<Record> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_container: HashMap<&str, Vec<&Record>> = HashMap::new();

    for record in records {
        if record.source_type != SourceType::PdfText || record.bbox.is_none() {
            continue;
        }
        let container = record.container.as_str();
        by_container
            .entry(container)
            .or_insert_with(|| {
                order.push(container);
                Vec::new()
            })
            .push(record);
    }

    let mut synthetic = Vec::new();

    for container in order {
        let Some(mut tokens) = by_container.remove(container) else {
            continue;
        };
        tokens.sort_by(|a, b| {
            let (a, b) = (bbox_of(a), bbox_of(b));
            a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0))
        });

        let mut buckets: Vec<Bucket<'_>> = Vec::new();
        for token in tokens {
            let y = bbox_of(token).1;
            match buckets.iter_mut().find(|b| (y - b.y_ref).abs() <= y_tol) {
                Some(bucket) => bucket.tokens.push(token),
                None => buckets.push(Bucket {
                    y_ref: y,
                    tokens: vec![token],
                }),
            }
        }

        for mut bucket in buckets {
            bucket
                .tokens
                .sort_by(|a, b| bbox_of(a).0.total_cmp(&bbox_of(b).0));

            let line_text = bucket
                .tokens
                .iter()
                .map(|t| normalize(&t.text))
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            if line_text.is_empty() {
                continue;
            }

            let mut line = Record::new(SourceType::PdfLine, line_text)
                .with_container(container)
                .with_id(format!("line::{}::{}", container, bucket.y_ref.round_ties_even() as i64));
            line.source_path = bucket.tokens[0].source_path.clone();
            synthetic.push(line);
        }
    }

    synthetic
}

/// (x0, top) of a token; callers only pass tokens that carry a bbox.
fn bbox_of(record: &Record) -> (f64, f64) {
    record.bbox.map(|b| (b.x0, b.top)).unwrap_or((0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn token(page: u32, x: f64, y: f64, text: &str) -> Record {
        Record::new(SourceType::PdfText, text)
            .with_source_path("/docs/a.pdf")
            .with_container(format!("page={}", page))
            .with_bbox(BBox::new(x, y, x + 10.0, y + 8.0))
    }

    #[test]
    fn test_tokens_on_same_baseline_join() {
        let records = vec![
            token(1, 50.0, 100.4, "홍길동"),
            token(1, 10.0, 100.0, "성명:"),
            token(1, 10.0, 120.0, "주소"),
        ];
        let lines = aggregate_lines(&records, 2.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "성명: 홍길동");
        assert_eq!(lines[0].id, "line::page=1::100");
        assert_eq!(lines[0].source_type, SourceType::PdfLine);
        assert!(lines[0].bbox.is_none());
        assert!(lines[0].row.is_none());
        assert_eq!(lines[0].source_path, "/docs/a.pdf");
        assert_eq!(lines[1].text, "주소");
    }

    #[test]
    fn test_pages_are_separate() {
        let records = vec![token(1, 0.0, 10.0, "a"), token(2, 0.0, 10.0, "b")];
        let lines = aggregate_lines(&records, 2.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].container, "page=1");
        assert_eq!(lines[1].container, "page=2");
    }

    #[test]
    fn test_tolerance_boundary() {
        let records = vec![token(1, 0.0, 10.0, "a"), token(1, 5.0, 12.5, "b")];
        assert_eq!(aggregate_lines(&records, 2.0).len(), 2);
        assert_eq!(aggregate_lines(&records, 2.5).len(), 1);
    }

    #[test]
    fn test_ignores_non_token_records() {
        let records = vec![
            Record::new(SourceType::Xlsx, "x").with_container("Sheet1"),
            Record::new(SourceType::PdfText, "no bbox").with_container("page=1"),
        ];
        assert!(aggregate_lines(&records, 2.0).is_empty());
    }

    #[test]
    fn test_blank_lines_dropped() {
        let records = vec![token(1, 0.0, 10.0, " \u{200B} ")];
        assert!(aggregate_lines(&records, 2.0).is_empty());
    }

    #[test]
    fn test_line_id_rounds_half_to_even() {
        let records = vec![
            token(1, 0.0, 100.5, "a"),
            token(1, 0.0, 130.5, "b"),
            token(1, 0.0, 160.4, "c"),
        ];
        let ids: Vec<String> = aggregate_lines(&records, 2.0).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["line::page=1::100", "line::page=1::130", "line::page=1::160"]);
    }
}
