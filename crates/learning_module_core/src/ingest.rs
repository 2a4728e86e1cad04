//! crates/learning_module_core/src/ingest.rs
//!
//! Accepts raw lesson content at the boundary, before any module or run exists.

use crate::ports::{PortError, TextExtractor};

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("Uploaded file is not valid UTF-8 text")]
    InvalidText,
    #[error("Could not read the uploaded PDF: {0}")]
    Extraction(PortError),
}

/// How an upload's bytes become lesson text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Text,
    Pdf,
}

/// Decides how to read an upload. When the declared type is missing or
/// generic, the file extension decides.
pub fn classify_upload(
    content_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<UploadKind, IngestError> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    match media_type.as_deref() {
        Some("text/plain") | Some("text/markdown") | Some("text/x-markdown") => Ok(UploadKind::Text),
        Some("application/pdf") => Ok(UploadKind::Pdf),
        Some(other) => Err(IngestError::UnsupportedContentType(other.to_string())),
        None => {
            let extension = file_name
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase());
            match extension.as_deref() {
                Some("txt") | Some("md") | Some("markdown") => Ok(UploadKind::Text),
                Some("pdf") => Ok(UploadKind::Pdf),
                Some(ext) => Err(IngestError::UnsupportedContentType(format!(".{}", ext))),
                None => Err(IngestError::UnsupportedContentType("unknown".to_string())),
            }
        }
    }
}

/// Decodes a plain text or Markdown upload.
pub fn decode_text(bytes: &[u8]) -> Result<String, IngestError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| IngestError::InvalidText)
}

/// Turns an uploaded file into lesson text. PDFs go through the extractor;
/// a PDF without a text layer is rejected.
pub async fn read_upload(
    extractor: &dyn TextExtractor,
    content_type: Option<&str>,
    file_name: Option<&str>,
    bytes: &[u8],
) -> Result<String, IngestError> {
    match classify_upload(content_type, file_name)? {
        UploadKind::Text => decode_text(bytes),
        UploadKind::Pdf => {
            let text = extractor
                .extract_text(bytes)
                .await
                .map_err(IngestError::Extraction)?;
            if text.trim().is_empty() {
                return Err(IngestError::Extraction(PortError::Invalid(
                    "the document has no text layer".to_string(),
                )));
            }
            Ok(text)
        }
    }
}

/// The first hundred characters of the content followed by an ellipsis.
pub fn default_description(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= DESCRIPTION_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let preview: String = trimmed.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    format!("{}...", preview)
}
