//! Benchmarks for piimask pipeline stages.
//!
//! Run with: cargo bench
//!
//! These benchmarks test classification, filtering and masking at various
//! record counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use piimask::{
    classify, filter_records, mask_records, BBox, Context, DedupeMode, FilterOptions, MaskOptions,
    PiiType, Record, SourceType,
};

const HEADERS: &[(&str, &str)] = &[
    ("성명", "홍길동"),
    ("연락처", "010-1234-5678"),
    ("이메일", "hong@example.com"),
    ("주소", "서울특별시 강남구 테헤란로 123"),
    ("주민등록번호", "900101-1234567"),
    ("부서", "영업팀"),
    ("지급항목", "기본급여"),
    ("카드번호", "4111-1111-1111-1111"),
];

/// Creates a synthetic sheet of `rows` rows over the fixed headers.
fn create_sheet_records(rows: usize) -> Vec<Record> {
    let mut records = Vec::with_capacity(rows * HEADERS.len());
    for row in 0..rows {
        for (col, (header, value)) in HEADERS.iter().enumerate() {
            records.push(
                Record::new(SourceType::Xlsx, *value)
                    .with_id(format!("{}-{}", row, col))
                    .with_container("Sheet1")
                    .with_position(row as i64 + 2, col as i64 + 1)
                    .with_header(*header),
            );
        }
    }
    records
}

/// Creates PDF text tokens laid out as `lines` lines of four tokens.
fn create_pdf_tokens(lines: usize) -> Vec<Record> {
    let words = ["성명:", "홍길동", "연락처", "010-1234-5678"];
    let mut records = Vec::with_capacity(lines * words.len());
    for line in 0..lines {
        let top = line as f64 * 14.0;
        for (i, word) in words.iter().enumerate() {
            let x0 = i as f64 * 60.0;
            records.push(
                Record::new(SourceType::PdfText, *word)
                    .with_container("page=1")
                    .with_bbox(BBox::new(x0, top, x0 + 50.0, top + 10.0)),
            );
        }
    }
    records
}

/// Benchmark single-value classification.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (header, value) in HEADERS {
        let ctx = Context::with_header(header, SourceType::Xlsx);
        group.bench_with_input(BenchmarkId::new("value", header), value, |b, value| {
            b.iter(|| classify(black_box(value), &ctx));
        });
    }

    group.finish();
}

/// Benchmark the filter stage.
fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    for rows in [10, 100, 1000].iter() {
        let records = create_sheet_records(*rows);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &records, |b, records| {
            let options = FilterOptions::default();
            b.iter(|| filter_records(black_box(records), &options));
        });
    }

    for lines in [10, 100, 500].iter() {
        let records = create_pdf_tokens(*lines);
        group.bench_with_input(
            BenchmarkId::new("pdf_lines", lines),
            &records,
            |b, records| {
                let options = FilterOptions::new()
                    .with_dedupe(DedupeMode::ByText)
                    .with_line_aggregation(2.0);
                b.iter(|| filter_records(black_box(records), &options));
            },
        );
    }

    group.finish();
}

/// Benchmark the mask stage.
fn bench_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask");

    for rows in [10, 100, 1000].iter() {
        let records = filter_records(&create_sheet_records(*rows), &FilterOptions::default()).records;
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &records, |b, records| {
            let options = MaskOptions::default();
            b.iter(|| mask_records(black_box(records), &options).unwrap());
        });
    }

    group.finish();

    c.bench_function("mask_address", |b| {
        b.iter(|| piimask::mask(PiiType::Address, black_box("서울특별시 강남구 테헤란로 123")));
    });
}

criterion_group!(benches, bench_classify, bench_filter, bench_mask);
criterion_main!(benches);
