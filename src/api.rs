//! HTTP surface: upload/extraction, validation and study-material endpoints.

use crate::document::Document;
use crate::error::ServiceError;
use crate::extract::TextExtractor;
use crate::generator::{ContentGenerator, GenerationRequest, TaskKind};
use crate::quality::{self, QualityAssessment, QualityLabel};
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "pdf-study-service";

/// Application state shared across handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn TextExtractor>,
    pub generator: ContentGenerator,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/summary", post(summary))
        .route("/api/flashcards", post(flashcards))
        .route("/api/quiz", post(quiz))
        .route("/api/chat", post(chat))
        .route("/api/outline", post(outline))
        .route("/api/notes", post(notes))
        .route("/extract-pdf-text", post(extract_pdf_text))
        .route("/validate-pdf", post(validate_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    extractor: String,
}

#[derive(Serialize)]
struct UploadResponse {
    text: String,
}

#[derive(Serialize)]
struct ExtractResponse {
    success: bool,
    text: String,
    dolma_content: Vec<serde_json::Value>,
    filename: String,
    text_length: usize,
}

#[derive(Serialize)]
struct ValidateResponse {
    success: bool,
    text_length: usize,
    quality: QualityLabel,
    issues: Vec<String>,
    sample: String,
    filename: String,
}

impl ValidateResponse {
    fn new(assessment: QualityAssessment, filename: String) -> Self {
        Self {
            success: assessment.success(),
            text_length: assessment.text_length,
            quality: assessment.quality,
            issues: assessment.issues,
            sample: assessment.sample,
            filename,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "PDF study service is running",
        status: "healthy",
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        extractor: state.extractor.name().to_string(),
    })
}

/// Upload a PDF and return its plain text.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let document = read_pdf_upload(&mut multipart).await?;
    let extracted = run_extraction(&state, &document).await?;
    Ok(Json(UploadResponse {
        text: extracted.text,
    }))
}

/// Extract text plus any OCR sidecar records.
async fn extract_pdf_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ServiceError> {
    let document = read_pdf_upload(&mut multipart).await?;
    let extracted = run_extraction(&state, &document).await?;
    Ok(Json(ExtractResponse {
        success: true,
        text_length: extracted.len(),
        text: extracted.text,
        dolma_content: extracted.dolma_content,
        filename: document.filename,
    }))
}

/// Extract and grade the text. Extraction failures become a poor result, not an error.
async fn validate_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ValidateResponse>, ServiceError> {
    let document = read_pdf_upload(&mut multipart).await?;

    let assessment = match run_extraction(&state, &document).await {
        Ok(extracted) => quality::assess(&extracted.text),
        Err(e) => QualityAssessment::failed(e),
    };
    info!(
        "Validated {}: quality={}, {} chars",
        document.filename,
        assessment.quality.as_str(),
        assessment.text_length
    );

    Ok(Json(ValidateResponse::new(assessment, document.filename)))
}

async fn summary(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Summary, &fields).await
}

async fn flashcards(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Flashcards, &fields).await
}

async fn quiz(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Quiz, &fields).await
}

async fn chat(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Chat, &fields).await
}

async fn outline(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Outline, &fields).await
}

async fn notes(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    generate(&state, TaskKind::Notes, &fields).await
}

// ============================================================================
// Helper functions
// ============================================================================

async fn read_pdf_upload(multipart: &mut Multipart) -> Result<Document, ServiceError> {
    let document = Document::from_multipart(multipart).await?;
    if let Err(e) = document.ensure_pdf() {
        warn!(
            "Rejected non-PDF upload: {} (extension {:?})",
            document.filename,
            document.extension()
        );
        return Err(e);
    }
    Ok(document)
}

async fn run_extraction(
    state: &AppState,
    document: &Document,
) -> Result<crate::extract::ExtractedText, ServiceError> {
    let extracted = state.extractor.extract(document).await.map_err(|e| {
        error!(
            "{} extraction failed for {} (id={}): {}",
            state.extractor.name(),
            document.filename,
            document.id,
            e
        );
        e
    })?;

    if extracted.is_empty() {
        warn!("No text extracted from {} (id={})", document.filename, document.id);
    }
    Ok(extracted)
}

async fn generate(
    state: &AppState,
    task: TaskKind,
    fields: &FormFields,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let text = fields.require("text")?;
    let request = match task {
        TaskKind::Chat => GenerationRequest::chat(text, fields.require("question")?),
        _ => GenerationRequest::new(task, text),
    };

    let output = state.generator.generate(&request).await?;

    let mut body = serde_json::Map::new();
    body.insert(
        task.response_key().to_string(),
        serde_json::Value::String(output),
    );
    Ok(Json(serde_json::Value::Object(body)))
}

/// Text form fields, accepted as urlencoded or multipart bodies.
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    fn require(&self, name: &str) -> Result<String, ServiceError> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::Validation(format!("Missing form field: {}", name)))
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ServiceError::from_rejection(e.status(), e.body_text()))?;
            return Ok(Self(fields));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ServiceError::from_rejection(e.status(), e.body_text()))?;

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::from_rejection(e.status(), e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| {
                    ServiceError::from_rejection(
                        e.status(),
                        format!("Failed to read field {}: {}", name, e.body_text()),
                    )
                })?;
            fields.insert(name, value);
        }
        Ok(Self(fields))
    }
}
