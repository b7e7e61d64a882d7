//! Uploaded documents. A `Document` lives for exactly one request.

use crate::error::ServiceError;
use axum::extract::Multipart;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// An uploaded file held in memory for the duration of a request.
#[derive(Debug, Clone)]
pub struct Document {
    /// Request-scoped id, used in logs and temp file names.
    pub id: Uuid,
    pub filename: String,
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            data,
        }
    }

    /// Read the `file` field from a multipart upload.
    pub async fn from_multipart(multipart: &mut Multipart) -> Result<Self, ServiceError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::from_rejection(e.status(), e.body_text()))?
        {
            if field.name() == Some("file") {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        ServiceError::from_rejection(
                            e.status(),
                            format!("Failed to read file: {}", e.body_text()),
                        )
                    })?
                    .to_vec();

                let document = Self::new(filename, data);
                info!(
                    "Received file: {} ({} bytes) id={}",
                    document.filename,
                    document.data.len(),
                    document.id
                );
                return Ok(document);
            }
        }

        Err(ServiceError::Validation("No file uploaded".to_string()))
    }

    /// Declared extension, lowercased.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Reject anything whose filename does not end in `.pdf`.
    pub fn ensure_pdf(&self) -> Result<(), ServiceError> {
        if is_pdf_filename(&self.filename) {
            Ok(())
        } else {
            Err(ServiceError::Validation(
                "Only PDF files are supported".to_string(),
            ))
        }
    }

    /// Final path component of the client-supplied name, safe to join onto a temp dir.
    pub fn safe_filename(&self) -> String {
        let name = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() || name == "." || name == ".." {
            format!("{}.pdf", self.id)
        } else {
            name.to_string()
        }
    }

    /// Base name without extension, as the OCR pipeline names its output.
    pub fn stem(&self) -> String {
        let safe = self.safe_filename();
        Path::new(&safe)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(safe)
    }
}

pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}
