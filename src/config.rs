//! Runtime configuration.
//!
//! Values come from an optional JSON file (`SERVICE_CONFIG`) and are then
//! overridden by environment variables (after `.env` has been loaded).
//! Credentials are only ever read from here, never from source.

use crate::extract::ExtractorKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_OCR_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Top-level service configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Parent directory for request-scoped temp files. System temp dir if unset.
    pub work_dir: Option<PathBuf>,
    pub extractor: ExtractorKind,
    pub olmocr: OlmOcrConfig,
    pub openai: OpenAiConfig,
}

/// Settings for the external OCR pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OlmOcrConfig {
    pub program: String,
    /// Leading arguments; workspace, `--markdown` and `--pdfs <file>` are appended.
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Hide GPUs from the child process and force torch onto the CPU.
    pub cpu_only: bool,
}

/// Settings for the chat-completion endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            work_dir: None,
            extractor: ExtractorKind::Direct,
            olmocr: OlmOcrConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl Default for OlmOcrConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["-m".to_string(), "olmocr.pipeline".to_string()],
            timeout_secs: DEFAULT_OCR_TIMEOUT_SECS,
            cpu_only: false,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl OlmOcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServiceConfig {
    /// Load from `SERVICE_CONFIG` (if set), then apply environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("SERVICE_CONFIG") {
            Ok(path) => Self::load_from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;

        info!(
            "Config: extractor={}, model={}, api_key={}",
            config.extractor.as_str(),
            config.openai.model,
            if config.openai.api_key.is_some() { "set" } else { "missing" }
        );
        Ok(config)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: ServiceConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid PORT: {}", port))?;
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("Invalid MAX_UPLOAD_BYTES: {}", limit))?;
        }
        if let Some(dir) = lookup("WORK_DIR") {
            self.work_dir = Some(PathBuf::from(dir));
        }
        if let Some(kind) = lookup("EXTRACTOR") {
            self.extractor = ExtractorKind::from_str(&kind).with_context(|| {
                format!("Unknown EXTRACTOR: {} (expected 'direct' or 'olmocr')", kind)
            })?;
        }

        if let Some(program) = lookup("OLMOCR_PROGRAM") {
            self.olmocr.program = program;
        }
        if let Some(args) = lookup("OLMOCR_ARGS") {
            self.olmocr.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(secs) = lookup("OLMOCR_TIMEOUT_SECS") {
            self.olmocr.timeout_secs = secs
                .parse()
                .with_context(|| format!("Invalid OLMOCR_TIMEOUT_SECS: {}", secs))?;
        }
        if let Some(flag) = lookup("OLMOCR_CPU_ONLY") {
            self.olmocr.cpu_only = parse_flag(&flag)
                .with_context(|| format!("Invalid OLMOCR_CPU_ONLY: {}", flag))?;
        }

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.openai.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(url) = lookup("OPENAI_API_URL") {
            self.openai.api_url = url;
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
