//! Benchmarks for xlsx-stream row throughput.
//!
//! Run with: cargo bench
//!
//! These benchmarks synthesize workbooks of various row counts and
//! measure full two-pass streaming through the public API.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{Cursor, Write};

use xlsx_stream::XlsxReader;

/// Creates a synthetic XLSX workbook with the given number of rows.
fn create_test_xlsx(row_count: usize) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default();

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
    )
    .unwrap();

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#,
    )
    .unwrap();

    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    zip.write_all(
        br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>alpha</t></si><si><t>beta</t></si></sst>"#,
    )
    .unwrap();

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for row in 1..=row_count {
        sheet.push_str(&format!(
            r#"<row r="{row}"><c r="A{row}" t="s"><v>{}</v></c><c r="B{row}"><v>{row}</v></c><c r="C{row}"><v>{}.5</v></c></row>"#,
            row % 2,
            row
        ));
    }
    sheet.push_str("</sheetData></worksheet>");

    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(sheet.as_bytes()).unwrap();
    zip.finish().unwrap();
    buffer
}

fn bench_stream_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_rows");

    for row_count in [100usize, 1_000, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.xlsx");
        std::fs::write(&path, create_test_xlsx(row_count)).unwrap();
        let uri = path.to_str().unwrap().to_string();

        group.throughput(Throughput::Elements(row_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(row_count),
            &uri,
            |b, uri| {
                b.iter(|| {
                    let mut reader = XlsxReader::from_uri(uri).unwrap();
                    let rows: u64 = reader
                        .stream_rows()
                        .unwrap()
                        .map(|r| black_box(r.unwrap()))
                        .count() as u64;
                    assert_eq!(rows, row_count as u64);
                })
            },
        );
    }

    group.finish();
}

fn bench_to_csv(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.xlsx");
    std::fs::write(&path, create_test_xlsx(5_000)).unwrap();
    let uri = path.to_str().unwrap().to_string();

    c.bench_function("to_csv_5k_rows", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(256 * 1024);
            let mut reader = XlsxReader::from_uri(&uri).unwrap();
            reader.to_csv(&mut out).unwrap();
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_stream_rows, bench_to_csv);
criterion_main!(benches);
