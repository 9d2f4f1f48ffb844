//! CSV serialization of dense rows.
//!
//! Standard dialect: comma delimiter, CRLF terminator, double-quote
//! enclosing only where needed, embedded quotes doubled. Because dense
//! rows vary in width, each record is padded with empty trailing fields
//! up to the widest row seen so far in the invocation.

use std::io::Write;

use crate::error::{Error, Result};

/// Writes dense rows as CSV records into any byte sink.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    width: usize,
    rows: u64,
}

impl<W: Write> CsvSink<W> {
    /// Wrap a byte sink.
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .quote_style(csv::QuoteStyle::Necessary)
            .flexible(true)
            .from_writer(sink);
        Self {
            writer,
            width: 0,
            rows: 0,
        }
    }

    /// Write one row, padded to the running maximum width.
    pub fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.width = self.width.max(row.len());
        // A record needs at least one field to render as a line.
        let padding = (self.width - row.len()).max(if self.width == 0 { 1 } else { 0 });
        let record = row
            .iter()
            .map(String::as_str)
            .chain(std::iter::repeat("").take(padding));
        self.writer.write_record(record).map_err(sink_error)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the sink and return the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().map_err(Error::SinkIo)?;
        Ok(self.rows)
    }
}

fn sink_error(err: csv::Error) -> Error {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => Error::SinkIo(io),
        other => Error::SinkIo(std::io::Error::other(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(rows: &[&[&str]]) -> String {
        let mut out = Vec::new();
        let mut sink = CsvSink::new(&mut out);
        for row in rows {
            let owned: Vec<String> = row.iter().map(|s| s.to_string()).collect();
            sink.write_row(&owned).unwrap();
        }
        sink.finish().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn writes_crlf_records() {
        let out = render(&[&["name", "age"], &["alice", "30"]]);
        assert_eq!(out, "name,age\r\nalice,30\r\n");
    }

    #[test]
    fn quotes_only_when_needed() {
        let out = render(&[&["plain", "with,comma", "with\"quote", "multi\nline"]]);
        assert_eq!(
            out,
            "plain,\"with,comma\",\"with\"\"quote\",\"multi\nline\"\r\n"
        );
    }

    #[test]
    fn pads_to_widest_row_so_far() {
        let out = render(&[&["a", "b", "c"], &["d"]]);
        assert_eq!(out, "a,b,c\r\nd,,\r\n");
    }

    #[test]
    fn counts_rows() {
        let mut out = Vec::new();
        let mut sink = CsvSink::new(&mut out);
        sink.write_row(&["x".to_string()]).unwrap();
        sink.write_row(&["y".to_string()]).unwrap();
        assert_eq!(sink.finish().unwrap(), 2);
    }
}
