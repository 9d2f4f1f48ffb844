//! S3 object store byte source backed by the official AWS SDK.
//!
//! Credentials and region come from the SDK's standard discovery chain
//! (environment, shared profile, IMDS); this module never parses them.
//! The async SDK is driven from a private current-thread runtime so the
//! source presents the same blocking pull contract as the other
//! transports.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{Error, Result};

use super::{OriginKind, SourceMetadata, SourceOptions, SPREADSHEET_CONTENT_TYPE};

pub(super) struct S3Stream {
    rt: tokio::runtime::Runtime,
    body: ByteStream,
    chunk: Vec<u8>,
    pos: usize,
    read_timeout: Duration,
    deadline: Option<Instant>,
}

impl Read for S3Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout.into_io());
                }
            }
            // The timeout future must be created inside the runtime, or
            // its timer has no reactor to register with.
            let read_timeout = self.read_timeout;
            let body = &mut self.body;
            let pull = self
                .rt
                .block_on(async { tokio::time::timeout(read_timeout, body.try_next()).await });
            match pull {
                Err(_elapsed) => return Err(Error::Timeout.into_io()),
                Ok(Err(e)) => return Err(Error::Network(e.to_string()).into_io()),
                Ok(Ok(None)) => return Ok(0),
                Ok(Ok(Some(bytes))) => {
                    self.chunk = bytes.to_vec();
                    self.pos = 0;
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub(super) fn open(
    bucket: &str,
    key: &str,
    region: Option<&str>,
    options: &SourceOptions,
) -> Result<S3Stream> {
    let rt = runtime()?;
    let client = rt.block_on(make_client(region));

    let output = rt
        .block_on(client.get_object().bucket(bucket).key(key).send())
        .map_err(|e| classify(e, bucket, key))?;

    log::debug!(
        "GetObject s3://{bucket}/{key} ({} bytes)",
        output
            .content_length()
            .map_or_else(|| "?".to_string(), |n| n.to_string())
    );

    Ok(S3Stream {
        rt,
        body: output.body,
        chunk: Vec::new(),
        pos: 0,
        read_timeout: options.read_timeout,
        deadline: options.deadline.map(|d| Instant::now() + d),
    })
}

/// Probe object size and content type with HeadObject. Failures degrade
/// to defaults rather than aborting; only the data stream is strict.
pub(super) fn metadata(
    bucket: &str,
    key: &str,
    region: Option<&str>,
    _options: &SourceOptions,
) -> SourceMetadata {
    let mut size = None;
    let mut content_type = None;

    match runtime() {
        Ok(rt) => {
            let client = rt.block_on(make_client(region));
            match rt.block_on(client.head_object().bucket(bucket).key(key).send()) {
                Ok(head) => {
                    size = head.content_length().and_then(|n| u64::try_from(n).ok());
                    content_type = head.content_type().map(str::to_string);
                }
                Err(e) => log::warn!(
                    "could not probe s3://{bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                ),
            }
        }
        Err(e) => log::warn!("could not start runtime for s3://{bucket}/{key}: {e}"),
    }

    SourceMetadata {
        origin: OriginKind::ObjectStore,
        location: format!("s3://{bucket}/{key}"),
        size,
        content_type: content_type.unwrap_or_else(|| SPREADSHEET_CONTENT_TYPE.to_string()),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)
}

async fn make_client(region: Option<&str>) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    let config = loader.load().await;
    aws_sdk_s3::Client::new(&config)
}

fn classify(
    err: SdkError<aws_sdk_s3::operation::get_object::GetObjectError>,
    bucket: &str,
    key: &str,
) -> Error {
    match &err {
        SdkError::ServiceError(ctx) => {
            if ctx.err().is_no_such_key() {
                return Error::NotFound(format!("s3://{bucket}/{key}"));
            }
            let status = ctx.raw().status().as_u16();
            if status == 401 || status == 403 {
                return Error::Auth(format!("{}", DisplayErrorContext(&err)));
            }
            Error::Network(format!("{}", DisplayErrorContext(&err)))
        }
        SdkError::TimeoutError(_) => Error::Timeout,
        // Construction failures are almost always credential or region
        // discovery coming up empty.
        SdkError::ConstructionFailure(_) => Error::Auth(format!("{}", DisplayErrorContext(&err))),
        _ => Error::Network(format!("{}", DisplayErrorContext(&err))),
    }
}
