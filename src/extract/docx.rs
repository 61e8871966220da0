use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use super::{ExtractionError, TextExtractor};

const DOCUMENT_PART: &str = "word/document.xml";

/// DOCX text extractor.
///
/// Reads the main document part and emits one line per paragraph (`w:p`). Tabs and explicit
/// line breaks inside a paragraph are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::failed(filename, format!("not a DOCX archive: {e}")))?;
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| ExtractionError::failed(filename, format!("missing {DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractionError::failed(filename, e))?;

        paragraphs_from_xml(&xml).map_err(|reason| ExtractionError::failed(filename, reason))
    }
}

fn paragraphs_from_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("XML parse error: {e}"))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
