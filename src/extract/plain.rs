use super::{ExtractionError, TextExtractor};

/// Extractor for text formats.
///
/// Bodies are decoded as UTF-8; anything that is not valid UTF-8 is read as Latin-1, which maps
/// every byte to a character and so never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => {
                tracing::debug!(filename, "Body is not UTF-8; decoding as Latin-1");
                Ok(bytes.iter().map(|&byte| char::from(byte)).collect())
            }
        }
    }
}
