//! Byte sources for the streaming pipeline.
//!
//! A [`SourceSpec`] names a resource that can be opened any number of
//! times; every [`SourceSpec::open`] call yields a fresh, one-shot,
//! forward-only byte stream. The two-pass orchestration in
//! [`crate::XlsxReader`] relies on exactly that: one open for the package
//! index, a second for the worksheet.
//!
//! The set of transports is a closed union. Dispatch is by variant, and
//! adding a transport means extending the enum in this one place.

mod local;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "s3")]
mod s3;

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// MIME type reported when the transport does not know better.
pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Steady-state read chunk; the configured chunk size only caps this.
pub(crate) const DEFAULT_CHUNK_TARGET: usize = 64 * 1024;

/// Default upper bound for the raw read buffer (16 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default per-chunk read timeout for remote transports.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Which transport a source stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    /// Local filesystem path.
    Local,
    /// HTTP or HTTPS URL.
    Http,
    /// S3-compatible object store.
    ObjectStore,
}

impl std::fmt::Display for OriginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginKind::Local => write!(f, "local"),
            OriginKind::Http => write!(f, "http"),
            OriginKind::ObjectStore => write!(f, "s3"),
        }
    }
}

/// Coarse facts about a source, available without consuming the stream.
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    /// Transport the metadata came from.
    pub origin: OriginKind,
    /// Origin-specific identifier: the file path, the URL, or the
    /// `s3://bucket/key` address.
    pub location: String,
    /// Total size in bytes, when the transport reports one.
    pub size: Option<u64>,
    /// Reported content type, defaulting to the SpreadsheetML MIME type.
    pub content_type: String,
}

/// Tuning knobs carried by value through the pipeline.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Upper bound for the raw read buffer in bytes.
    pub chunk_size: usize,
    /// Per-chunk read timeout for remote transports.
    pub read_timeout: Duration,
    /// Optional total deadline for a whole pass.
    pub deadline: Option<Duration>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            deadline: None,
        }
    }
}

impl SourceOptions {
    /// Actual buffer capacity used for raw reads: the steady-state chunk
    /// target capped by the configured maximum.
    pub(crate) fn buffer_capacity(&self) -> usize {
        DEFAULT_CHUNK_TARGET.min(self.chunk_size).max(512)
    }
}

/// A source specifier: enough information to open independent byte
/// streams against the same logical artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// An HTTP/HTTPS URL with optional extra request headers.
    Http {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// An object in an S3-compatible store.
    ObjectStore {
        bucket: String,
        key: String,
        region: Option<String>,
    },
}

impl SourceSpec {
    /// Route a source string to a transport by scheme.
    ///
    /// `s3://bucket/key` selects the object store, `http://` and
    /// `https://` select HTTP, and anything that does not parse as a URL
    /// with a multi-character scheme is treated as a filesystem path
    /// (single-letter schemes are Windows drive prefixes).
    pub fn parse(input: &str) -> Result<Self> {
        match url::Url::parse(input) {
            Ok(parsed) if parsed.scheme().len() > 1 => match parsed.scheme() {
                "s3" => {
                    let bucket = parsed.host_str().unwrap_or_default().to_string();
                    let key = parsed.path().trim_start_matches('/').to_string();
                    if !valid_bucket_name(&bucket) || key.is_empty() {
                        return Err(Error::UnsupportedSource(format!(
                            "invalid S3 URI {input:?}, expected s3://bucket/key"
                        )));
                    }
                    Ok(SourceSpec::ObjectStore {
                        bucket,
                        key,
                        region: None,
                    })
                }
                "http" | "https" => Ok(SourceSpec::Http {
                    url: input.to_string(),
                    headers: Vec::new(),
                }),
                other => Err(Error::UnsupportedSource(format!(
                    "unknown scheme {other:?} in {input:?}"
                ))),
            },
            _ => Ok(SourceSpec::Local(PathBuf::from(input))),
        }
    }

    /// Transport kind this specifier routes to.
    pub fn origin(&self) -> OriginKind {
        match self {
            SourceSpec::Local(_) => OriginKind::Local,
            SourceSpec::Http { .. } => OriginKind::Http,
            SourceSpec::ObjectStore { .. } => OriginKind::ObjectStore,
        }
    }

    /// Open a fresh one-shot byte stream against this source.
    ///
    /// The returned reader owns its socket or file descriptor and
    /// releases it on drop, whether iteration completed or not.
    pub fn open(&self, options: &SourceOptions) -> Result<Box<dyn Read + Send>> {
        log::debug!("opening {} source", self.origin());
        match self {
            SourceSpec::Local(path) => Ok(Box::new(local::open(path)?)),
            SourceSpec::Http { url, headers } => {
                #[cfg(feature = "http")]
                {
                    Ok(Box::new(http::open(url, headers, options)?))
                }
                #[cfg(not(feature = "http"))]
                {
                    let _ = (url, headers, options);
                    Err(Error::UnsupportedSource(
                        "HTTP sources require the `http` feature".to_string(),
                    ))
                }
            }
            SourceSpec::ObjectStore {
                bucket,
                key,
                region,
            } => {
                #[cfg(feature = "s3")]
                {
                    Ok(Box::new(s3::open(bucket, key, region.as_deref(), options)?))
                }
                #[cfg(not(feature = "s3"))]
                {
                    let _ = (bucket, key, region, options);
                    Err(Error::UnsupportedSource(
                        "S3 sources require the `s3` feature".to_string(),
                    ))
                }
            }
        }
    }

    /// Return known facts about the source without consuming a stream.
    pub fn metadata(&self, options: &SourceOptions) -> Result<SourceMetadata> {
        match self {
            SourceSpec::Local(path) => local::metadata(path),
            SourceSpec::Http { url, headers } => {
                #[cfg(feature = "http")]
                {
                    Ok(http::metadata(url, headers, options))
                }
                #[cfg(not(feature = "http"))]
                {
                    let _ = (url, headers, options);
                    Err(Error::UnsupportedSource(
                        "HTTP sources require the `http` feature".to_string(),
                    ))
                }
            }
            SourceSpec::ObjectStore {
                bucket,
                key,
                region,
            } => {
                #[cfg(feature = "s3")]
                {
                    Ok(s3::metadata(bucket, key, region.as_deref(), options))
                }
                #[cfg(not(feature = "s3"))]
                {
                    let _ = (bucket, key, region, options);
                    Err(Error::UnsupportedSource(
                        "S3 sources require the `s3` feature".to_string(),
                    ))
                }
            }
        }
    }
}

/// S3 bucket naming rules: 3-63 chars of lowercase alphanumerics, dots
/// and dashes.
fn valid_bucket_name(bucket: &str) -> bool {
    (3..=63).contains(&bucket.len())
        && bucket
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_s3_uri() {
        let spec = SourceSpec::parse("s3://my-bucket/data/report.xlsx").unwrap();
        assert_eq!(
            spec,
            SourceSpec::ObjectStore {
                bucket: "my-bucket".to_string(),
                key: "data/report.xlsx".to_string(),
                region: None,
            }
        );
        assert_eq!(spec.origin(), OriginKind::ObjectStore);
    }

    #[test]
    fn routes_http_uri() {
        let spec = SourceSpec::parse("https://example.com/report.xlsx").unwrap();
        assert_eq!(spec.origin(), OriginKind::Http);
    }

    #[test]
    fn routes_plain_path() {
        let spec = SourceSpec::parse("./data/report.xlsx").unwrap();
        assert_eq!(spec, SourceSpec::Local(PathBuf::from("./data/report.xlsx")));
    }

    #[test]
    fn routes_windows_drive_as_path() {
        let spec = SourceSpec::parse("C:/data/report.xlsx").unwrap();
        assert_eq!(spec.origin(), OriginKind::Local);
    }

    #[test]
    fn rejects_unknown_scheme() {
        match SourceSpec::parse("ftp://example.com/report.xlsx") {
            Err(Error::UnsupportedSource(_)) => {}
            other => panic!("expected UnsupportedSource, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_bucket() {
        assert!(SourceSpec::parse("s3://NO/key").is_err());
        assert!(SourceSpec::parse("s3://ab/key").is_err());
        assert!(SourceSpec::parse("s3://bucket-only/").is_err());
    }

    #[test]
    fn buffer_capacity_is_capped_by_chunk_size() {
        let mut options = SourceOptions::default();
        assert_eq!(options.buffer_capacity(), DEFAULT_CHUNK_TARGET);
        options.chunk_size = 4096;
        assert_eq!(options.buffer_capacity(), 4096);
    }
}
