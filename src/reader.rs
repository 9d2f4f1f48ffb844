//! Unified reader facade over source, unzipper, index, and streamer.
//!
//! Forward-only archive access forces two passes: the shared string
//! table may sit after the worksheet in archive order, yet must be in
//! hand before the first cell is interpreted. Each pass opens its own
//! byte stream from the same specifier; pass 2 never starts before
//! pass 1 has fully built the package index.

use std::io::{Read, Write};

use crate::csv::CsvSink;
use crate::error::{Error, Result, Warning};
use crate::package::PackageIndex;
use crate::sheet::RowStream;
use crate::source::{SourceMetadata, SourceOptions, SourceSpec};
use crate::unzip::{MemberReader, ZipStream};

type SheetSource = MemberReader<Box<dyn Read + Send>>;

/// Handler invoked for each non-fatal warning.
pub type WarningHandler = Box<dyn FnMut(&Warning) + Send>;

/// Source facts plus, once a pass has run, the workbook's sheet names.
#[derive(Debug, Clone)]
pub struct ReaderMetadata {
    /// Transport-level facts about the source.
    pub source: SourceMetadata,
    /// Sheet names in workbook order; `None` before any pass has run.
    pub sheet_names: Option<Vec<String>>,
}

/// Streaming XLSX reader over any supported byte source.
///
/// # Example
///
/// ```no_run
/// use xlsx_stream::XlsxReader;
///
/// let mut reader = XlsxReader::from_uri("s3://reports/monthly.xlsx")?
///     .with_sheet_name("Data");
/// let mut csv = Vec::new();
/// let rows = reader.to_csv(&mut csv)?;
/// println!("{rows} rows");
/// # Ok::<(), xlsx_stream::Error>(())
/// ```
pub struct XlsxReader {
    spec: SourceSpec,
    sheet_name: Option<String>,
    options: SourceOptions,
    on_warning: Option<WarningHandler>,
    sheet_names: Option<Vec<String>>,
}

impl XlsxReader {
    /// Build a reader from an already-routed source specifier.
    pub fn new(spec: SourceSpec) -> Self {
        Self {
            spec,
            sheet_name: None,
            options: SourceOptions::default(),
            on_warning: None,
            sheet_names: None,
        }
    }

    /// Build a reader from a source string (`s3://`, `http(s)://`, or a
    /// filesystem path).
    pub fn from_uri(uri: &str) -> Result<Self> {
        Ok(Self::new(SourceSpec::parse(uri)?))
    }

    /// Select the worksheet by name; the default is the first sheet in
    /// workbook order.
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    /// Replace all tuning options.
    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }

    /// Cap the raw read buffer at `bytes`.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.options.chunk_size = bytes;
        self
    }

    /// Install a handler for non-fatal warnings; without one they are
    /// logged at `warn` level.
    pub fn on_warning(mut self, handler: impl FnMut(&Warning) + Send + 'static) -> Self {
        self.on_warning = Some(Box::new(handler));
        self
    }

    /// Stream the selected worksheet as dense rows.
    ///
    /// Runs both passes: the returned iterator owns the second pass's
    /// transport and decompressor, releasing them when dropped.
    pub fn stream_rows(&mut self) -> Result<Rows> {
        let index = self.build_index()?;

        let member_path = match &self.sheet_name {
            Some(name) => index
                .directory
                .resolve(name)
                .ok_or_else(|| Error::SheetNotFound(name.clone()))?
                .to_string(),
            None => match index.directory.first() {
                Some((name, path)) => {
                    log::debug!("defaulting to first sheet {name:?}");
                    path.to_string()
                }
                None => {
                    self.emit(Warning::EmptyWorkbook);
                    return Ok(Rows { inner: None });
                }
            },
        };

        let raw = self.spec.open(&self.options)?;
        let zip = ZipStream::new(raw, self.options.buffer_capacity());
        let member = zip
            .find_member(&member_path)?
            .ok_or(Error::SheetNotFound(member_path))?;

        Ok(Rows {
            inner: Some(RowStream::new(
                member,
                index.shared_strings,
                self.options.buffer_capacity(),
            )),
        })
    }

    /// Stream the selected worksheet into `sink` as CSV and return the
    /// number of rows written.
    pub fn to_csv<W: Write>(&mut self, sink: W) -> Result<u64> {
        let rows = self.stream_rows()?;
        let mut csv = CsvSink::new(sink);
        for row in rows {
            csv.write_row(&row?)?;
        }
        let written = csv.finish()?;
        log::info!("wrote {written} rows");
        Ok(written)
    }

    /// Known facts about the source; `sheet_names` is populated once
    /// any pass has run.
    pub fn metadata(&mut self) -> Result<ReaderMetadata> {
        Ok(ReaderMetadata {
            source: self.spec.metadata(&self.options)?,
            sheet_names: self.sheet_names.clone(),
        })
    }

    /// Pass 1: open a fresh stream and build the package index.
    fn build_index(&mut self) -> Result<PackageIndex> {
        log::info!("indexing package from {} source", self.spec.origin());
        let raw = self.spec.open(&self.options)?;
        let mut zip = ZipStream::new(raw, self.options.buffer_capacity());

        let mut warnings = Vec::new();
        let index = PackageIndex::from_zip(&mut zip, &mut |w| warnings.push(w))?;
        for warning in warnings {
            self.emit(warning);
        }

        self.sheet_names = Some(index.directory.names());
        log::info!(
            "package indexed: {} shared strings, {} worksheets",
            index.shared_strings.len(),
            index.directory.len()
        );
        Ok(index)
    }

    fn emit(&mut self, warning: Warning) {
        match &mut self.on_warning {
            Some(handler) => handler(&warning),
            None => log::warn!("{warning}"),
        }
    }
}

/// Owning iterator of dense rows from one worksheet.
///
/// Empty when the workbook declares no worksheets.
pub struct Rows {
    inner: Option<RowStream<SheetSource>>,
}

impl Iterator for Rows {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next()
    }
}
