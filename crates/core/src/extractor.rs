use crate::error::IngestError;
use crate::models::Document as PageDocument;
use lopdf::Document;
use std::path::Path;

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageDocument>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageDocument>, IngestError> {
        let document = Document::load(path)
            .map_err(|error| IngestError::PdfParse(format!("{}: {error}", path.display())))?;
        let source = path.to_string_lossy().to_string();

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("{}: {error}", path.display())))?;

            if text.trim().is_empty() {
                tracing::debug!(path = %path.display(), page = page_no, "page has no text");
                continue;
            }

            pages.push(PageDocument {
                source: source.clone(),
                page: page_no,
                text,
            });
        }

        if pages.is_empty() {
            tracing::warn!(path = %path.display(), "pdf had no readable page text");
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageDocument>, IngestError> {
    LopdfExtractor.extract_pages(path)
}
