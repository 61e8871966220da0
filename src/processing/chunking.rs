//! Character-window chunking with boundary-aware cuts.
//!
//! Sizes and overlaps are counted in Unicode scalar values, never bytes, so multi-byte text is
//! split on character boundaries. Each window prefers to end after a sentence terminator or
//! newline, then after whitespace, and only hard-cuts when neither appears in the second half of
//! the window.

use super::types::{Chunk, ChunkingError};

const SENTENCE_BREAKS: [char; 4] = ['.', '!', '?', '\n'];

/// Normalise extracted text before chunking.
///
/// Line endings become `\n`, runs of other whitespace (tabs, form feeds, non-breaking spaces)
/// collapse to one space, runs of three or more newlines collapse to a paragraph break, other
/// control characters are dropped, and outer whitespace is trimmed.
pub fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut cleaned = String::with_capacity(normalized.len());
    let mut pending_space = false;
    let mut newline_run = 0usize;

    for ch in normalized.chars() {
        match ch {
            '\n' => {
                pending_space = false;
                newline_run += 1;
                if newline_run <= 2 {
                    cleaned.push('\n');
                }
            }
            c if c.is_whitespace() => pending_space = true,
            c if c.is_control() => {}
            c => {
                if pending_space && newline_run == 0 && !cleaned.is_empty() {
                    cleaned.push(' ');
                }
                pending_space = false;
                newline_run = 0;
                cleaned.push(c);
            }
        }
    }

    cleaned.trim().to_string()
}

/// Split `text` into overlapping chunks of at most `size` characters.
///
/// Text no longer than `size` comes back as a single chunk, including the empty string.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    let spans = chunk_spans(text, size, overlap)?;
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();

    Ok(spans
        .into_iter()
        .map(|(start, end)| text[offsets[start]..offsets[end]].to_string())
        .collect())
}

/// Chunk `text` and attribute every piece to `filename`.
pub fn chunk_document(
    filename: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    Ok(chunk_text(text, size, overlap)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            index,
            filename: filename.to_string(),
        })
        .collect())
}

/// Compute chunk boundaries as half-open character ranges.
pub(crate) fn chunk_spans(
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<(usize, usize)>, ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= size {
        return Err(ChunkingError::InvalidOverlap { size, overlap });
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len <= size {
        return Ok(vec![(0, len)]);
    }

    let half = size / 2;
    let mut spans = Vec::with_capacity(len / (size - overlap) + 1);
    let mut start = 0usize;

    loop {
        let mut end = (start + size).min(len);
        if end < len {
            end = start + boundary_offset(&chars[start..end], half).unwrap_or(end - start);
        }

        spans.push((start, end));
        if end == len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    Ok(spans)
}

/// Offset just past the preferred cut point inside `window`, if one lies beyond `half`.
fn boundary_offset(window: &[char], half: usize) -> Option<usize> {
    let last_matching = |predicate: fn(&char) -> bool| {
        window
            .iter()
            .rposition(predicate)
            .filter(|&position| position > half)
            .map(|position| position + 1)
    };

    last_matching(|c| SENTENCE_BREAKS.contains(c)).or_else(|| last_matching(|c| c.is_whitespace()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_full_coverage(text: &str, size: usize, overlap: usize) {
        let len = text.chars().count();
        let spans = chunk_spans(text, size, overlap).expect("spans");
        let mut covered = vec![false; len];
        for (start, end) in &spans {
            assert!(end - start <= size, "chunk longer than window");
            for flag in &mut covered[*start..*end] {
                *flag = true;
            }
        }
        assert!(covered.into_iter().all(|flag| flag), "gap in coverage");
        assert_eq!(spans.last().map(|span| span.1), Some(len));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello world", 100, 10).unwrap(), vec!["hello world"]);
        assert_eq!(chunk_text("", 100, 10).unwrap(), vec![""]);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            chunk_text("abc", 0, 0).unwrap_err(),
            ChunkingError::InvalidChunkSize
        );
        assert_eq!(
            chunk_text("abc", 10, 10).unwrap_err(),
            ChunkingError::InvalidOverlap {
                size: 10,
                overlap: 10
            }
        );
    }

    #[test]
    fn prefers_sentence_boundaries_past_half_window() {
        let text = "First sentence is here. Second sentence follows it. Third one closes.";
        let chunks = chunk_text(text, 30, 5).unwrap();
        assert_eq!(chunks[0], "First sentence is here.");
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 30));
    }

    #[test]
    fn falls_back_to_whitespace_then_hard_cut() {
        let words = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk_text(words, 20, 0).unwrap();
        assert_eq!(chunks[0], "alpha beta gamma ");

        let solid = "x".repeat(45);
        let chunks = chunk_text(&solid, 20, 0).unwrap();
        assert_eq!(
            chunks.iter().map(String::len).collect::<Vec<_>>(),
            vec![20, 20, 5]
        );
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "y".repeat(100);
        let spans = chunk_spans(&text, 30, 10).unwrap();
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1 - pair[1].0, 10);
        }
        assert_full_coverage(&text, 30, 10);
    }

    #[test]
    fn covers_every_character_for_mixed_text() {
        let text = "The quick brown fox. Jumps over\nthe lazy dog! Does it? Yes it does, many times over and over again.\n\nNew paragraph with ünïcödé and 日本語 text.";
        for (size, overlap) in [(10, 0), (16, 4), (25, 12), (40, 39), (7, 3)] {
            assert_full_coverage(text, size, overlap);
        }
    }

    #[test]
    fn boundary_cut_chunks_step_back_by_overlap() {
        let text = "The quick brown fox. Jumps over\nthe lazy dog! Does it? Yes it does, many times over and over again.\n\nNew paragraph with ünïcödé and 日本語 text.";
        for (size, overlap) in [(16, 4), (25, 8), (30, 10)] {
            let spans = chunk_spans(text, size, overlap).unwrap();
            assert!(spans.len() > 2);
            for pair in spans.windows(2) {
                let ((start, end), (next_start, _)) = (pair[0], pair[1]);
                if end.saturating_sub(overlap) > start {
                    assert_eq!(end - next_start, overlap, "size {size} overlap {overlap}");
                } else {
                    assert_eq!(next_start, end);
                }
            }
        }

        let chunks = chunk_text(text, 25, 8).unwrap();
        for pair in chunks.windows(2) {
            let previous: Vec<char> = pair[0].chars().collect();
            let tail: String = previous[previous.len() - 8..].iter().collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn splits_multibyte_text_on_char_boundaries() {
        let text = "日本語のテキスト。".repeat(10);
        let chunks = chunk_text(&text, 12, 3).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 12));
    }

    #[test]
    fn large_overlap_still_terminates() {
        let text = "a. ".repeat(200);
        let spans = chunk_spans(&text, 10, 9).unwrap();
        assert!(spans.len() < text.len());
        assert_full_coverage(&text, 10, 9);
    }

    #[test]
    fn document_chunks_are_numbered_in_order() {
        let chunks = chunk_document("doc.txt", &"word ".repeat(30), 20, 5).unwrap();
        assert!(chunks.len() > 1);
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
            assert_eq!(chunk.filename, "doc.txt");
        }
    }

    #[test]
    fn clean_text_normalises_whitespace() {
        let raw = "  Title\r\n\r\n\r\n\r\nBody   with\t\ttabs\rand lines  \n\n\n";
        assert_eq!(clean_text(raw), "Title\n\nBody with tabs\nand lines");
    }

    #[test]
    fn clean_text_treats_unicode_and_control_whitespace_as_spaces() {
        assert_eq!(clean_text("page one\x0cpage two"), "page one page two");
        assert_eq!(clean_text("tab\x0bstop"), "tab stop");
        assert_eq!(clean_text("a\u{a0}\u{a0}\u{a0}b"), "a b");
        assert_eq!(clean_text("bell\u{7}ed"), "belled");
    }
}
