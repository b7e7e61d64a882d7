//! Chat-completion client for OpenAI-compatible endpoints.

use crate::config::OpenAiConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const TEMPERATURE: f32 = 0.3;

/// Anything that can turn a prompt into a completion.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: Vec<Message>, max_tokens: u32) -> Result<String>;
}

/// Client for `/v1/chat/completions`.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl OpenAiClient {
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: Vec<Message>, max_tokens: u32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY environment variable not set")?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature: TEMPERATURE,
        };

        debug!(
            "Sending request to {}: model={}, max_tokens={}",
            self.api_url, request.model, max_tokens
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to completion API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, error_text);
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        if let Some(usage) = &response.usage {
            info!(
                "Completion: {} tokens (prompt: {}, completion: {})",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Option<(Option<String>, serde_json::Value)>>>;

    /// Serve a canned completion on a local port and record what was sent.
    async fn stub_server(status: u16, body: serde_json::Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(request): Json<serde_json::Value>| {
                let sink = sink.clone();
                let body = body.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *sink.lock().unwrap() = Some((auth, request));
                    (
                        axum::http::StatusCode::from_u16(status).unwrap(),
                        Json(body),
                    )
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/chat/completions", addr), captured)
    }

    fn client(api_url: String, api_key: Option<&str>) -> OpenAiClient {
        OpenAiClient::from_config(&OpenAiConfig {
            api_key: api_key.map(str::to_string),
            model: "gpt-4".to_string(),
            api_url,
        })
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_trims() {
        let (url, captured) = stub_server(
            200,
            serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  A summary.\n"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
            }),
        )
        .await;

        let answer = client(url, Some("sk-test"))
            .complete(vec![Message::system("sys"), Message::user("doc")], 800)
            .await
            .unwrap();
        assert_eq!(answer, "A summary.");

        let (auth, request) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(request["model"], "gpt-4");
        assert_eq!(request["max_tokens"], 800);
        assert!((request["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["content"], "doc");
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let (url, _) = stub_server(
            429,
            serde_json::json!({"error": {"message": "Rate limit reached"}}),
        )
        .await;

        let err = client(url, Some("sk-test"))
            .complete(vec![Message::user("doc")], 500)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("429"));
        assert!(message.contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let err = client("http://127.0.0.1:9/unused".to_string(), None)
            .complete(vec![Message::user("doc")], 500)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
