//! Rulebook text extraction
//!
//! This module handles:
//! - Per-page text extraction behind the [`PageExtractor`] trait
//! - PDF parsing (lopdf)
//! - Whitespace normalization of extracted text

mod pdf;

pub use pdf::*;

use crate::error::Result;
use async_trait::async_trait;

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: usize,

    /// Normalized page text (may be empty for image-only pages)
    pub text: String,
}

impl PageText {
    pub fn new(page_number: usize, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Turns stored rulebook bytes into per-page text
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extract every page in document order
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<PageText>>;
}

/// Check the PDF signature
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            // Before adding a non-whitespace char, handle accumulated whitespace
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    // Multiple newlines = paragraph break, preserve as double newline
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result
}
