//! Text extraction from uploaded documents.
//!
//! [`DocumentExtractor`] picks an extractor by file extension: plain text formats decode as
//! UTF-8 (falling back to Latin-1), PDFs go through `pdf_oxide`, and DOCX bodies are read from
//! the `word/document.xml` part of the archive.

mod docx;
mod pdf;
mod plain;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use plain::PlainTextExtractor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

/// Errors raised while turning an uploaded file into plain text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File extension is not handled by any extractor.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    /// The file was recognised but its contents could not be parsed.
    #[error("Failed to extract text from '{filename}': {reason}")]
    Failed {
        /// Name of the offending upload.
        filename: String,
        /// Parser or I/O failure description.
        reason: String,
    },
    /// Upload body could not be decoded from its transfer encoding.
    #[error("Invalid upload encoding: {0}")]
    InvalidEncoding(String),
    /// Upload exceeded the configured size limit.
    #[error("File size exceeds {limit_mb}MB limit")]
    TooLarge {
        /// Limit in megabytes.
        limit_mb: usize,
    },
    /// Document contained no text after cleaning.
    #[error("No text could be extracted from '{0}'")]
    EmptyDocument(String),
}

impl ExtractionError {
    pub(crate) fn failed(filename: &str, reason: impl ToString) -> Self {
        Self::Failed {
            filename: filename.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Converts raw file bytes into text ready for cleaning and chunking.
pub trait TextExtractor: Send + Sync {
    /// Extract the textual body of `filename`.
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extensions decoded as plain text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "text", "rst", "log"];

/// Dispatches to a format-specific extractor by lowercase file extension.
///
/// Files without an extension are treated as plain text.
pub struct DocumentExtractor {
    extractors: HashMap<&'static str, Arc<dyn TextExtractor>>,
    fallback: Arc<dyn TextExtractor>,
}

impl DocumentExtractor {
    /// Build a dispatcher from `(extension, extractor)` pairs.
    pub fn new(
        extractors: Vec<(&'static str, Arc<dyn TextExtractor>)>,
        fallback: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            extractors: extractors.into_iter().collect(),
            fallback,
        }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        let plain: Arc<dyn TextExtractor> = Arc::new(PlainTextExtractor);
        let mut extractors: Vec<(&'static str, Arc<dyn TextExtractor>)> = TEXT_EXTENSIONS
            .iter()
            .map(|&ext| (ext, plain.clone()))
            .collect();
        extractors.push(("pdf", Arc::new(PdfExtractor)));
        extractors.push(("docx", Arc::new(DocxExtractor)));
        Self::new(extractors, plain)
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let extractor = match extension.as_deref() {
            None => &self.fallback,
            Some(ext) => self
                .extractors
                .get(ext)
                .ok_or_else(|| ExtractionError::UnsupportedFormat(format!(".{ext}")))?,
        };
        extractor.extract(filename, bytes)
    }
}

/// Transfer encoding of an uploaded file body.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    /// Body is the file's text as-is.
    #[default]
    Text,
    /// Body is the file's bytes in standard base64; required for PDF and DOCX.
    Base64,
}

/// Turn an uploaded body into raw file bytes according to `encoding`.
pub fn decode_content(content: &str, encoding: ContentEncoding) -> Result<Vec<u8>, ExtractionError> {
    match encoding {
        ContentEncoding::Text => Ok(content.as_bytes().to_vec()),
        ContentEncoding::Base64 => STANDARD
            .decode(content.trim())
            .map_err(|error| ExtractionError::InvalidEncoding(error.to_string())),
    }
}
