//! PDF study service - extracts text from uploaded PDFs and turns it into study material.

mod api;
mod config;
mod document;
mod error;
mod extract;
mod generator;
mod openai;
mod quality;

use api::AppState;
use config::ServiceConfig;
use generator::ContentGenerator;
use openai::OpenAiClient;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdf_study_service=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;

    let extractor = extract::from_config(&config);
    info!("Text extractor: {}", extractor.name());

    let client = OpenAiClient::from_config(&config.openai);
    if config.openai.api_key.is_none() {
        warn!("OPENAI_API_KEY not set; generation endpoints will fail");
    }
    info!("Completion client initialized (model={})", client.model());

    let state = AppState {
        extractor,
        generator: ContentGenerator::new(Arc::new(client)),
    };
    let app = api::router(state, config.max_upload_bytes);

    // Run server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
