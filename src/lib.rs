//! # xlsx-stream
//!
//! Memory-bounded streaming conversion of XLSX workbooks to row-oriented
//! output, pulling bytes from local files, HTTP(S) URLs, or S3 objects.
//!
//! The whole pipeline is a pull-based iterator chain: requesting the
//! next row pulls the next XML event, which pulls the next decompressed
//! chunk, which pulls from the transport. The workbook is never
//! materialized in memory; peak usage is one decompressor window, one
//! read buffer, the shared string table, and the row under construction.
//!
//! ## Quick Start
//!
//! ```no_run
//! use xlsx_stream::XlsxReader;
//!
//! // Convert a workbook to CSV on stdout.
//! let mut reader = XlsxReader::from_uri("data.xlsx")?;
//! reader.to_csv(std::io::stdout().lock())?;
//!
//! // Or iterate rows directly.
//! let mut reader = XlsxReader::from_uri("https://example.com/report.xlsx")?
//!     .with_sheet_name("Data");
//! for row in reader.stream_rows()? {
//!     let row = row?;
//!     println!("{} cells", row.len());
//! }
//! # Ok::<(), xlsx_stream::Error>(())
//! ```
//!
//! ## Two passes
//!
//! A ZIP archive is read forward-only here, and the shared string pool
//! can sit after the worksheet member. Every conversion therefore opens
//! the source twice: pass 1 builds the shared string table and the
//! sheet directory, pass 2 streams the selected worksheet. Sources are
//! cheap to reopen by construction; wrap a one-shot stream in a temp
//! file if yours is not.
//!
//! ## Features
//!
//! - `http` (default): HTTP/HTTPS sources via reqwest
//! - `s3` (default): S3 sources via the AWS SDK

pub mod csv;
pub mod error;
pub mod package;
pub mod reader;
pub mod sheet;
pub mod source;
pub mod unzip;

// Re-exports
pub use error::{Error, Result, Warning};
pub use reader::{ReaderMetadata, Rows, WarningHandler, XlsxReader};
pub use source::{OriginKind, SourceMetadata, SourceOptions, SourceSpec};

/// Stream the first worksheet of `uri` as dense rows.
///
/// Shorthand for [`XlsxReader::from_uri`] followed by
/// [`XlsxReader::stream_rows`].
pub fn stream_rows(uri: &str) -> Result<Rows> {
    XlsxReader::from_uri(uri)?.stream_rows()
}

/// Convert the first worksheet of `uri` to CSV, returning the row count.
pub fn to_csv<W: std::io::Write>(uri: &str, sink: W) -> Result<u64> {
    XlsxReader::from_uri(uri)?.to_csv(sink)
}
