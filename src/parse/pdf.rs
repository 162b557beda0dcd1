//! PDF page extraction

use super::{is_pdf, normalize_whitespace, PageExtractor, PageText};
use crate::error::{Error, Result};
use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

/// Extracts page text from PDF bytes with lopdf
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageExtractor for PdfExtractor {
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<PageText>> {
        // Parsing is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes))
            .await
            .map_err(|e| Error::Extraction(format!("PDF extraction task failed: {}", e)))?
    }
}

/// Parse a PDF and return normalized text for every page.
///
/// Pages whose text cannot be decoded come back empty; a document that cannot
/// be loaded at all is an extraction error.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<PageText>> {
    if !is_pdf(bytes) {
        return Err(Error::Extraction("Not a PDF document".to_string()));
    }

    let document = Document::load_mem(bytes)
        .map_err(|e| Error::Extraction(format!("Unreadable PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(Error::Extraction("Encrypted PDFs are not supported".to_string()));
    }

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(Error::Extraction("PDF has no pages".to_string()));
    }

    debug!("Extracting text from {} PDF pages", pages.len());

    let extracted = pages
        .keys()
        .enumerate()
        .map(|(position, &page_number)| {
            let text = match document.extract_text(&[page_number]) {
                Ok(raw) => normalize_whitespace(&raw),
                Err(e) => {
                    warn!(page = page_number, "Could not extract page text: {}", e);
                    String::new()
                }
            };
            PageText::new(position + 1, text)
        })
        .collect();

    Ok(extracted)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Build a simple PDF with one text line per page
    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_extracts_pages_in_order() {
        let bytes = build_pdf(&["Setup the board", "Take a turn", "Scoring"]);
        let pages = PdfExtractor::new().extract_pages(bytes).await.unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[2].page_number, 3);
        assert!(pages[1].text.contains("Take a turn"));
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = extract_pdf_pages(b"plain text, not a rulebook").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let err = extract_pdf_pages(b"%PDF-1.4\n%garbage").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
