//! Error types for the xlsx-stream library.

use std::io;
use std::sync::Mutex;

use thiserror::Error;

/// Result type alias for xlsx-stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while streaming a workbook.
#[derive(Error, Debug)]
pub enum Error {
    /// The source does not exist (file path, HTTP 404, or missing object).
    #[error("source not found: {0}")]
    NotFound(String),

    /// The source exists but access was denied by the filesystem.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The source specifier uses a scheme this build cannot open.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// The transport rejected the request credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A transport-level failure (DNS, connect, reset, service error).
    #[error("network error: {0}")]
    Network(String),

    /// The HTTP server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// A per-chunk read timeout or total deadline was exceeded.
    #[error("source read timed out")]
    Timeout,

    /// The redirect chain exceeded the configured limit.
    #[error("too many redirects fetching {0}")]
    TooManyRedirects(String),

    /// The archive byte stream ended or lost coherence mid-record.
    #[error("unexpected end of archive: {0}")]
    UnexpectedEof(String),

    /// A member's CRC-32 did not match the stored value.
    #[error("CRC mismatch in archive member {0:?}")]
    CrcMismatch(String),

    /// A member uses a compression scheme the streamer cannot decode.
    #[error("unsupported compression method {method} for member {member:?}")]
    UnsupportedMethod { method: u16, member: String },

    /// A member is encrypted.
    #[error("encrypted archive member {0:?}")]
    EncryptedEntry(String),

    /// The archive is part of a split/spanned set.
    #[error("split archives are not supported")]
    SplitArchive,

    /// The package has no xl/workbook.xml part.
    #[error("missing workbook part (xl/workbook.xml)")]
    MissingWorkbookPart,

    /// The package has no xl/_rels/workbook.xml.rels part.
    #[error("missing workbook relationships part (xl/_rels/workbook.xml.rels)")]
    MissingRelationshipsPart,

    /// The requested worksheet is not present in the workbook.
    #[error("sheet not found: {0:?}")]
    SheetNotFound(String),

    /// The XML in a package part could not be parsed.
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    /// A cell referenced a shared-string index outside the table.
    #[error("shared string index {0} out of range")]
    SharedStringIndex(usize),

    /// A cell address could not be decoded (e.g. "AA10").
    #[error("bad cell address: {0:?}")]
    BadCellAddress(String),

    /// The CSV output sink failed.
    #[error("output sink error: {0}")]
    SinkIo(#[source] io::Error),

    /// Any other I/O error from the byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Non-fatal conditions surfaced out-of-band while streaming.
///
/// Warnings never terminate the row stream. They are delivered to the
/// handler installed via [`crate::XlsxReader::on_warning`], or logged at
/// `warn` level when no handler is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two sheets share a name; the first occurrence wins.
    DuplicateSheetName(String),
    /// The workbook declares no worksheets.
    EmptyWorkbook,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::DuplicateSheetName(name) => {
                write!(f, "duplicate sheet name {name:?}, keeping the first")
            }
            Warning::EmptyWorkbook => write!(f, "workbook contains no worksheets"),
        }
    }
}

/// Smuggles a structured [`Error`] across an `std::io::Error` boundary.
///
/// The XML reader pulls member bytes through `std::io::Read`, so archive
/// and transport errors must survive a round-trip through `io::Error`
/// (which quick-xml additionally wraps in an `Arc`). The payload sits
/// behind a mutex so it can be taken back out through a shared reference.
#[derive(Debug)]
struct Carrier(Mutex<Option<Error>>);

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(err) => write!(f, "{err}"),
                None => write!(f, "error already taken"),
            },
            Err(_) => write!(f, "error unavailable"),
        }
    }
}

impl std::error::Error for Carrier {}

impl Error {
    /// Wrap this error so it can travel through an `io::Error`.
    pub(crate) fn into_io(self) -> io::Error {
        let kind = match &self {
            Error::Timeout => io::ErrorKind::TimedOut,
            Error::UnexpectedEof(_) => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, Carrier(Mutex::new(Some(self))))
    }

    /// Recover a structured error previously wrapped with [`Error::into_io`].
    pub(crate) fn from_io(err: io::Error) -> Error {
        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<Carrier>() {
                Ok(carrier) => match carrier.0.lock().ok().and_then(|mut g| g.take()) {
                    Some(original) => original,
                    None => Error::Io(io::Error::new(kind, "error already taken")),
                },
                Err(other) => Error::Io(io::Error::new(kind, other)),
            },
            None => Error::Io(io::Error::from(kind)),
        }
    }

    /// Recover a structured error from a quick-xml failure.
    ///
    /// quick-xml wraps reader I/O errors in an `Arc`, so the payload is
    /// extracted through the shared reference instead of by value.
    pub(crate) fn from_xml(err: quick_xml::Error) -> Error {
        if let quick_xml::Error::Io(arc) = &err {
            if let Some(carrier) = arc.get_ref().and_then(|r| r.downcast_ref::<Carrier>()) {
                if let Some(original) = carrier.0.lock().ok().and_then(|mut g| g.take()) {
                    return original;
                }
            }
            return Error::Io(io::Error::new(arc.kind(), arc.to_string()));
        }
        Error::MalformedXml(err.to_string())
    }
}
