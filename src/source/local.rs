//! Local filesystem byte source.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

use super::{OriginKind, SourceMetadata, SPREADSHEET_CONTENT_TYPE};

pub(super) fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| classify(e, path))
}

pub(super) fn metadata(path: &Path) -> Result<SourceMetadata> {
    let meta = std::fs::metadata(path).map_err(|e| classify(e, path))?;
    Ok(SourceMetadata {
        origin: OriginKind::Local,
        location: path.display().to_string(),
        size: Some(meta.len()),
        content_type: SPREADSHEET_CONTENT_TYPE.to_string(),
    })
}

fn classify(err: io::Error, path: &Path) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.display().to_string()),
        _ => Error::Io(err),
    }
}
