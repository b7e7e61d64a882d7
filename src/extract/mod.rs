//! Pluggable PDF text extraction.
//!
//! Defines the [`TextExtractor`] trait so the direct text-layer parser and the
//! external OCR pipeline can be swapped by configuration.

pub mod direct;
pub mod olmocr;

use crate::config::ServiceConfig;
use crate::document::Document;
use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile, TempDir};

/// Text produced from a PDF.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    /// JSON-lines records emitted next to the OCR output. Empty for direct parsing.
    pub dolma_content: Vec<serde_json::Value>,
}

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dolma_content: Vec::new(),
        }
    }

    /// Length in characters, not bytes.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Async trait implemented by each extraction strategy.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, document: &Document) -> Result<ExtractedText, ServiceError>;
}

/// Known strategy identifiers used for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Direct,
    OlmOcr,
}

impl ExtractorKind {
    /// Parse a configuration string into a strategy kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "olmocr" => Some(Self::OlmOcr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::OlmOcr => "olmocr",
        }
    }
}

/// Build the configured strategy.
pub fn from_config(config: &ServiceConfig) -> Arc<dyn TextExtractor> {
    match config.extractor {
        ExtractorKind::Direct => Arc::new(direct::DirectExtractor::new(config.work_dir.clone())),
        ExtractorKind::OlmOcr => Arc::new(olmocr::OlmOcrExtractor::new(
            config.olmocr.clone(),
            config.work_dir.clone(),
        )),
    }
}

// ============================================================================
// Request-scoped temp resources (removed on drop)
// ============================================================================

const TEMP_PREFIX: &str = "pdf-study-";

pub(crate) fn scoped_dir(work_dir: Option<&Path>) -> Result<TempDir, ServiceError> {
    let mut builder = Builder::new();
    builder.prefix(TEMP_PREFIX);
    match work_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .map_err(|e| ServiceError::Processing(format!("Failed to create temp directory: {}", e)))
}

pub(crate) fn scoped_file(work_dir: Option<&Path>) -> Result<NamedTempFile, ServiceError> {
    let mut builder = Builder::new();
    builder.prefix(TEMP_PREFIX).suffix(".pdf");
    match work_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| ServiceError::Processing(format!("Failed to create temp file: {}", e)))
}
