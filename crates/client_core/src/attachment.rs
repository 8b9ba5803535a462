//! Transit encoding for file attachments.
//!
//! A file travels over the same channel as text, so its bytes are
//! carried as a base64 data URL next to the original filename. The
//! encoding is lossless: `decode` returns the exact original bytes.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::protocol::FileAttachment;
use thiserror::Error;

const DATA_URL_PREFIX: &str = "data:application/octet-stream;base64,";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("attachment payload is not a base64 data url")]
    MalformedEncoding,
    #[error("invalid base64 in attachment payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Encodes a file's full contents into the transit form embedded in an
/// outbound message payload.
pub fn encode(name: impl Into<String>, bytes: &[u8]) -> FileAttachment {
    FileAttachment {
        name: name.into(),
        data: format!("{DATA_URL_PREFIX}{}", STANDARD.encode(bytes)),
    }
}

/// Decodes a transit attachment back to the original bytes.
pub fn decode(attachment: &FileAttachment) -> Result<Vec<u8>, AttachmentError> {
    let encoded = attachment
        .data
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(AttachmentError::MalformedEncoding)?;
    Ok(STANDARD.decode(encoded)?)
}

/// Reads a local file without blocking the event loop and encodes it for
/// transit. A read failure aborts the pending send; nothing else is
/// mutated on error.
pub async fn read_and_encode(name: &str, path: &Path) -> Result<FileAttachment, AttachmentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AttachmentError::Read {
            name: name.to_string(),
            source,
        })?;
    Ok(encode(name, &bytes))
}

#[cfg(test)]
#[path = "tests/attachment_tests.rs"]
mod tests;
