//! services/api/src/adapters/pdf_text.rs
//!
//! Implements the `TextExtractor` port with `pdf-extract`. Parsing is CPU bound,
//! so it runs on the blocking pool.

use async_trait::async_trait;
use learning_module_core::ports::{PortError, PortResult, TextExtractor};
use tracing::debug;

#[derive(Clone, Default)]
pub struct PdfTextAdapter;

impl PdfTextAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextAdapter {
    async fn extract_text(&self, bytes: &[u8]) -> PortResult<String> {
        let document = bytes.to_vec();
        let size = document.len();
        // A malformed document can make the parser panic; the join error covers that.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
            .await
            .map_err(|e| PortError::Invalid(format!("PDF parser stopped: {}", e)))?
            .map_err(|e| PortError::Invalid(e.to_string()))?;
        debug!(size, chars = text.chars().count(), "Extracted PDF text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_that_are_not_a_pdf_are_rejected() {
        let result = PdfTextAdapter::new().extract_text(b"plain words, no PDF here").await;
        assert!(matches!(result, Err(PortError::Invalid(_))));
    }
}
