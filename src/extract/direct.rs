//! Direct text-layer extraction with lopdf.

use super::{scoped_file, ExtractedText, TextExtractor};
use crate::document::Document;
use crate::error::ServiceError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct DirectExtractor {
    work_dir: Option<PathBuf>,
}

impl DirectExtractor {
    pub fn new(work_dir: Option<PathBuf>) -> Self {
        Self { work_dir }
    }
}

#[async_trait::async_trait]
impl TextExtractor for DirectExtractor {
    fn name(&self) -> &str {
        "direct"
    }

    async fn extract(&self, document: &Document) -> Result<ExtractedText, ServiceError> {
        document.ensure_pdf()?;

        let data = document.data.clone();
        let work_dir = self.work_dir.clone();
        let text = tokio::task::spawn_blocking(move || {
            extract_from_bytes(&data, work_dir.as_deref())
        })
        .await
        .map_err(|e| ServiceError::Processing(format!("Extraction task failed: {}", e)))??;

        info!(
            "DirectExtractor: {} -> {} chars (id={})",
            document.filename,
            text.chars().count(),
            document.id
        );
        Ok(ExtractedText::new(text))
    }
}

/// Spill the bytes to a temp file (removed when it drops) and parse it.
fn extract_from_bytes(data: &[u8], work_dir: Option<&Path>) -> Result<String, ServiceError> {
    let mut tmp = scoped_file(work_dir)?;
    tmp.write_all(data)
        .and_then(|_| tmp.flush())
        .map_err(|e| ServiceError::Processing(format!("Failed to write temp file: {}", e)))?;

    extract_pdf_text(tmp.path())
}

/// Extract text page by page, joining pages with newlines.
pub fn extract_pdf_text(path: &Path) -> Result<String, ServiceError> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| ServiceError::Processing(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    debug!("DirectExtractor: {} pages in {:?}", pages.len(), path);

    let page_numbers: Vec<u32> = pages.keys().copied().collect();
    extract_pages(&doc, &page_numbers)
}

/// A page with no text layer contributes an empty string.
/// A page the parser cannot read fails the whole extraction.
fn extract_pages(doc: &lopdf::Document, page_numbers: &[u32]) -> Result<String, ServiceError> {
    let texts = page_numbers
        .iter()
        .map(|page_num| {
            doc.extract_text(&[*page_num]).map_err(|e| {
                ServiceError::Processing(format!(
                    "Failed to extract text from page {}: {}",
                    page_num, e
                ))
            })
        })
        .collect::<Result<Vec<String>, ServiceError>>()?;

    Ok(texts.join("\n"))
}
