//! Page-aware text chunking
//!
//! This module handles splitting rulebooks into chunks while:
//! - Keeping every chunk inside a single page
//! - Preferring paragraph, sentence and word boundaries inside the window
//! - Numbering chunks sequentially across the whole document
//! - Computing content hashes

mod boundaries;

pub use boundaries::*;

use crate::config::ChunkConfig;
use crate::parse::PageText;
use blake3::Hasher;

/// A text chunk with its page provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk index (0-based, across the whole document)
    pub index: usize,

    /// 1-based page the chunk was cut from
    pub page_number: usize,

    /// The actual text content
    pub text: String,

    /// Byte start position within the page text
    pub char_start: usize,

    /// Byte end position within the page text
    pub char_end: usize,

    /// Blake3 hash of the chunk text
    pub hash: String,
}

/// Chunk every page of a document, in page order
pub fn chunk_pages(pages: &[PageText], config: &ChunkConfig) -> Vec<TextChunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for (start, end) in chunk_spans(&page.text, config) {
            let text = page.text[start..end].to_string();
            chunks.push(TextChunk {
                index: chunks.len(),
                page_number: page.page_number,
                hash: compute_text_hash(&text),
                text,
                char_start: start,
                char_end: end,
            });
        }
    }

    chunks
}

/// Split one page into overlapping `(start, end)` byte spans.
///
/// Spans are trimmed of surrounding whitespace; a tail shorter than
/// `min_chars` is folded into the preceding span.
pub fn chunk_spans(text: &str, config: &ChunkConfig) -> Vec<(usize, usize)> {
    let len = text.len();
    let window = config.window_chars.max(1);
    let break_points = find_break_points(text);

    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = if start + window >= len {
            len
        } else {
            find_best_break(text, start, window, &break_points)
        };
        if len - end < config.min_chars {
            end = len;
        }

        let slice = &text[start..end];
        let trimmed = slice.trim();
        if !trimmed.is_empty() {
            let lead = slice.len() - slice.trim_start().len();
            spans.push((start + lead, start + lead + trimmed.len()));
        }

        if end >= len {
            break;
        }

        let next = ensure_char_boundary(text, end.saturating_sub(config.overlap_chars));
        start = if next > start { next } else { end };
    }

    spans
}

/// Compute a stable hash for document content
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn compute_text_hash(text: &str) -> String {
    compute_content_hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_chunk_config() -> ChunkConfig {
        ChunkConfig {
            window_chars: 500,
            overlap_chars: 50,
            min_chars: 20,
        }
    }

    #[test]
    fn test_chunk_short_page() {
        let pages = vec![PageText::new(1, "Each player starts with 3 coins.")];
        let chunks = chunk_pages(&pages, &default_chunk_config());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Each player starts with 3 coins.");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].page_number, 1);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 32);
    }

    #[test]
    fn test_hard_cuts_with_overlap() {
        let text = "a".repeat(1000);
        let spans = chunk_spans(&text, &default_chunk_config());
        assert_eq!(spans, vec![(0, 500), (450, 950), (900, 1000)]);
    }

    #[test]
    fn test_short_tail_is_folded() {
        let text = "a".repeat(960);
        let spans = chunk_spans(&text, &default_chunk_config());
        // 950..960 would be a 10 byte tail, below min_chars
        assert_eq!(spans, vec![(0, 500), (450, 960)]);
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = "The robber moves. ".repeat(60);
        let config = default_chunk_config();
        let chunks = chunk_pages(&[PageText::new(1, text)], &config);

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with('.'), "chunk ended mid-sentence: {:?}", chunk.text);
            assert!(chunk.text.len() <= config.window_chars);
        }
    }

    #[test]
    fn test_chunks_never_span_pages_and_pages_are_monotonic() {
        let pages: Vec<PageText> = (1..=4)
            .map(|n| PageText::new(n, format!("Page {} rule text. ", n).repeat(40)))
            .collect();
        let chunks = chunk_pages(&pages, &default_chunk_config());

        for pair in chunks.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert!(pair[1].page_number >= pair[0].page_number);
        }
        for chunk in &chunks {
            let marker = format!("Page {} ", chunk.page_number);
            assert!(chunk.text.contains(&marker));
            for other in 1..=4 {
                if other != chunk.page_number {
                    assert!(!chunk.text.contains(&format!("Page {} ", other)));
                }
            }
        }
    }

    #[test]
    fn test_empty_pages_produce_no_chunks() {
        let pages = vec![
            PageText::new(1, ""),
            PageText::new(2, "Victory at 10 points."),
            PageText::new(3, "   "),
        ];
        let chunks = chunk_pages(&pages, &default_chunk_config());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 2);
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "Spielvorbereitung für Würfel – ".repeat(50);
        let spans = chunk_spans(&text, &default_chunk_config());
        for (start, end) in spans {
            assert!(text.is_char_boundary(start));
            assert!(text.is_char_boundary(end));
        }
    }

    #[test]
    fn test_chunking_is_reproducible() {
        let pages: Vec<PageText> = (1..=10)
            .map(|n| PageText::new(n, format!("Rule {} applies.\n\nDetails follow. ", n).repeat(30)))
            .collect();
        let config = default_chunk_config();
        assert_eq!(chunk_pages(&pages, &config), chunk_pages(&pages, &config));
    }

    #[test]
    fn test_content_hash() {
        let hash1 = compute_text_hash("hello world");
        let hash2 = compute_text_hash("hello world");
        let hash3 = compute_text_hash("different content");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }
}
