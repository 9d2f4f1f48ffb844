//! HTTP/HTTPS byte source backed by reqwest's blocking client.

use std::io::{self, Read};

use crate::error::{Error, Result};

use super::{OriginKind, SourceMetadata, SourceOptions, SPREADSHEET_CONTENT_TYPE};

const MAX_REDIRECTS: usize = 5;

/// Streams an HTTP response body, translating mid-body failures into
/// structured transport errors instead of opaque I/O errors.
pub(super) struct HttpBody {
    response: reqwest::blocking::Response,
}

impl Read for HttpBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf).map_err(|e| {
            let err = if e.kind() == io::ErrorKind::TimedOut {
                Error::Timeout
            } else {
                Error::Network(e.to_string())
            };
            err.into_io()
        })
    }
}

pub(super) fn open(
    url: &str,
    headers: &[(String, String)],
    options: &SourceOptions,
) -> Result<HttpBody> {
    let client = build_client(options)?;
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = request.send().map_err(|e| classify(e, url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16()));
    }
    log::debug!("GET {url} -> {status}");
    Ok(HttpBody { response })
}

/// Issue a HEAD request for size and content type. Transport failures
/// degrade to defaults; metadata is best-effort, like the stream is not.
pub(super) fn metadata(
    url: &str,
    headers: &[(String, String)],
    options: &SourceOptions,
) -> SourceMetadata {
    let mut size = None;
    let mut content_type = None;

    let probe = build_client(options).and_then(|client| {
        let mut request = client.head(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request.send().map_err(|e| classify(e, url))
    });

    match probe {
        Ok(response) if response.status().is_success() => {
            size = response.content_length();
            content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
        }
        Ok(response) => log::warn!("HEAD {url} -> {}", response.status()),
        Err(e) => log::warn!("could not probe {url}: {e}"),
    }

    SourceMetadata {
        origin: OriginKind::Http,
        location: url.to_string(),
        size,
        content_type: content_type.unwrap_or_else(|| SPREADSHEET_CONTENT_TYPE.to_string()),
    }
}

fn build_client(options: &SourceOptions) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .read_timeout(options.read_timeout)
        .timeout(options.deadline)
        .build()
        .map_err(|e| Error::Network(e.to_string()))
}

fn classify(err: reqwest::Error, url: &str) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_redirect() {
        Error::TooManyRedirects(url.to_string())
    } else if let Some(status) = err.status() {
        Error::HttpStatus(status.as_u16())
    } else {
        Error::Network(err.to_string())
    }
}
