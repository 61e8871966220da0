use std::io::Write;

use pdf_oxide::PdfDocument;

use super::{ExtractionError, TextExtractor};

/// PDF text extractor backed by `pdf_oxide`.
///
/// Pages are extracted in order and joined with blank lines; pages without text are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    fn extract_pages(
        path: &std::path::Path,
        filename: &str,
    ) -> Result<Vec<String>, ExtractionError> {
        let mut doc = PdfDocument::open(path)
            .map_err(|e| ExtractionError::failed(filename, format!("failed to parse PDF: {e}")))?;

        let page_count = doc.page_count().map_err(|e| {
            ExtractionError::failed(filename, format!("failed to read page count: {e}"))
        })?;

        let mut pages = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            let text = doc.extract_text(page_index).unwrap_or_default();
            if !text.trim().is_empty() {
                pages.push(text);
            }
        }
        Ok(pages)
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf_oxide reads from a path.
        let mut temp_file = tempfile::NamedTempFile::new().map_err(|e| {
            ExtractionError::failed(filename, format!("failed to create temp file: {e}"))
        })?;
        temp_file.write_all(bytes).map_err(|e| {
            ExtractionError::failed(filename, format!("failed to write temp file: {e}"))
        })?;

        let pages = Self::extract_pages(temp_file.path(), filename)?;
        tracing::info!(filename, page_count = pages.len(), "PDF text extraction complete");

        if pages.is_empty() {
            return Err(ExtractionError::EmptyDocument(filename.to_string()));
        }
        Ok(pages.join("\n\n"))
    }
}
