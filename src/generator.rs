//! Study-material generation on top of a completion client.
//!
//! Each task has a fixed system instruction and token ceiling. Output is
//! returned verbatim: flashcard and quiz completions are asked to be JSON
//! arrays but are not parsed or validated here.

use crate::error::ServiceError;
use crate::openai::{CompletionClient, Message};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// The kind of material to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Summary,
    Flashcards,
    Quiz,
    Outline,
    Notes,
    Chat,
}

impl TaskKind {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            TaskKind::Summary => {
                "You are an expert study assistant. Provide a comprehensive, educational summary of the following document. \
                 Focus on main topics, key concepts, and learning objectives. Use clear, educational language."
            }
            TaskKind::Flashcards => {
                "You are an expert at creating study flashcards. Read the document and generate 10 flashcards as a JSON array: \
                 [{\"question\": \"...\", \"answer\": \"...\"}, ...]. Focus on key concepts, definitions, and facts."
            }
            TaskKind::Quiz => {
                "You are an expert quiz creator. Generate a 5-question multiple choice quiz as a JSON array: \
                 [{\"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"correct\": 0}]. \
                 Base questions on the document."
            }
            TaskKind::Outline => {
                "You are an expert at creating outlines. Generate a detailed outline of the document using bullet points and indentation."
            }
            TaskKind::Notes => {
                "You are an expert at creating study notes. Create comprehensive notes from the document, including key concepts, facts, and definitions."
            }
            TaskKind::Chat => {
                "You are a helpful assistant that answers questions about the provided document. \
                 Use the document content to provide accurate and relevant answers."
            }
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            TaskKind::Summary => 800,
            TaskKind::Flashcards => 1500,
            TaskKind::Quiz => 1200,
            TaskKind::Outline => 1000,
            TaskKind::Notes => 1500,
            TaskKind::Chat => 500,
        }
    }

    /// Key the completion is returned under in the JSON response.
    pub fn response_key(&self) -> &'static str {
        match self {
            TaskKind::Summary => "summary",
            TaskKind::Flashcards => "flashcards",
            TaskKind::Quiz => "quiz",
            TaskKind::Outline => "outline",
            TaskKind::Notes => "notes",
            TaskKind::Chat => "answer",
        }
    }
}

/// One generation call. Built per request, never stored.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub text: String,
    /// Only used by [`TaskKind::Chat`].
    pub question: Option<String>,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(task: TaskKind, text: impl Into<String>) -> Self {
        Self {
            task,
            text: text.into(),
            question: None,
            max_tokens: task.max_tokens(),
        }
    }

    pub fn chat(text: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
            ..Self::new(TaskKind::Chat, text)
        }
    }

    /// System instruction followed by the user content.
    pub fn messages(&self) -> Vec<Message> {
        let user_content = match (self.task, &self.question) {
            (TaskKind::Chat, Some(question)) => {
                format!("Document: {}\n\nQuestion: {}", self.text, question)
            }
            _ => self.text.clone(),
        };
        vec![
            Message::system(self.task.system_prompt()),
            Message::user(user_content),
        ]
    }
}

/// Forwards generation requests to the completion client.
#[derive(Clone)]
pub struct ContentGenerator {
    client: Arc<dyn CompletionClient>,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Attempted once; failures surface as [`ServiceError::Upstream`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        info!(
            "Generating {:?} from {} chars (max_tokens={})",
            request.task,
            request.text.chars().count(),
            request.max_tokens
        );

        let completion = self
            .client
            .complete(request.messages(), request.max_tokens)
            .await
            .map_err(|e| {
                error!("Generation failed for {:?}: {:#}", request.task, e);
                ServiceError::Upstream(format!("{:#}", e))
            })?;

        Ok(completion.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::openai::Role;
    use std::sync::Mutex;

    /// Records the last call and replies with a fixed completion (or error).
    pub(crate) struct StubClient {
        pub reply: Result<String, String>,
        pub calls: Mutex<Vec<(Vec<Message>, u32)>>,
    }

    impl StubClient {
        pub(crate) fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, messages: Vec<Message>, max_tokens: u32) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push((messages, max_tokens));
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    #[test]
    fn test_token_ceilings() {
        let all = [
            TaskKind::Summary,
            TaskKind::Flashcards,
            TaskKind::Quiz,
            TaskKind::Outline,
            TaskKind::Notes,
            TaskKind::Chat,
        ];
        for task in all {
            let max = task.max_tokens();
            assert!((500..=1500).contains(&max), "{:?}", task);
        }
        assert_eq!(TaskKind::Chat.max_tokens(), 500);
        assert_eq!(TaskKind::Flashcards.max_tokens(), 1500);
    }

    #[test]
    fn test_structured_prompts_describe_json_shape() {
        let flashcards = TaskKind::Flashcards.system_prompt();
        assert!(flashcards.contains("JSON array"));
        assert!(flashcards.contains("\"answer\""));

        let quiz = TaskKind::Quiz.system_prompt();
        assert!(quiz.contains("\"options\""));
        assert!(quiz.contains("\"correct\""));
    }

    #[test]
    fn test_messages_for_plain_task() {
        let request = GenerationRequest::new(TaskKind::Outline, "Chapter 1");
        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, TaskKind::Outline.system_prompt());
        assert_eq!(messages[1], Message::user("Chapter 1"));
    }

    #[test]
    fn test_messages_for_chat() {
        let request = GenerationRequest::chat("Cells divide.", "How do cells divide?");
        assert_eq!(request.max_tokens, 500);
        assert_eq!(
            request.messages()[1].content,
            "Document: Cells divide.\n\nQuestion: How do cells divide?"
        );
    }

    #[tokio::test]
    async fn test_generate_passes_output_through() {
        let stub = StubClient::replying("  not really json ");
        let generator = ContentGenerator::new(stub.clone());

        let output = generator
            .generate(&GenerationRequest::new(TaskKind::Quiz, "text"))
            .await
            .unwrap();
        assert_eq!(output, "not really json");

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 1200);
    }

    #[tokio::test]
    async fn test_generate_maps_failure_to_upstream() {
        let stub = StubClient::failing("Completion API error (401): invalid key");
        let generator = ContentGenerator::new(stub.clone());

        let err = generator
            .generate(&GenerationRequest::new(TaskKind::Summary, "text"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        assert!(err.to_string().contains("invalid key"));
        assert_eq!(stub.calls.lock().unwrap().len(), 1);
    }
}
