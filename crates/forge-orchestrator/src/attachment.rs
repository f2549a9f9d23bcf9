//! Attachment encoding.
//!
//! Turns user-selected files into base64 [`Attachment`] records for the model
//! request. Each file is read and encoded on its own; batching and ordering
//! are handled by the studio.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use forge_client::Attachment;
use serde::Serialize;
use tracing::debug;

use crate::error::{ForgeError, Result};

/// Fallback MIME type when the extension is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Encodes raw bytes as an attachment.
#[must_use]
pub fn encode_bytes(name: impl Into<String>, bytes: &[u8], mime_type: impl Into<String>) -> Attachment {
    Attachment {
        name: name.into(),
        data: BASE64_STANDARD.encode(bytes),
        mime_type: mime_type.into(),
    }
}

/// Guesses the MIME type of `path` from its extension.
#[must_use]
pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Returns the file name used as the attachment name.
fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Reads and encodes one file.
///
/// # Errors
///
/// Returns `ForgeError::AttachmentRead` if the file cannot be read and
/// `ForgeError::AttachmentTooLarge` if it exceeds `max_bytes`.
pub async fn encode_file(path: &Path, max_bytes: u64) -> Result<Attachment> {
    let name = display_name(path);

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ForgeError::attachment_read(path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(ForgeError::attachment_read(path, "not a regular file"));
    }
    if metadata.len() > max_bytes {
        return Err(ForgeError::attachment_too_large(name, metadata.len(), max_bytes));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ForgeError::attachment_read(path, e.to_string()))?;

    let mime_type = guess_mime_type(path);
    debug!(name = %name, mime = %mime_type, size = bytes.len(), "Encoded attachment");
    Ok(encode_bytes(name, &bytes, mime_type))
}

/// A file that could not be attached.
#[derive(Debug, Clone, Serialize)]
pub struct AttachFailure {
    /// Path of the file.
    pub path: PathBuf,
    /// Why it was skipped.
    pub message: String,
}

/// Outcome of attaching a batch of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachReport {
    /// Names of attachments added, in completion order.
    pub attached: Vec<String>,
    /// Files that were skipped.
    pub failed: Vec<AttachFailure>,
}

impl AttachReport {
    /// Returns `true` if every file was attached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
