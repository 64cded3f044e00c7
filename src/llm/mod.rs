pub mod gemini;
pub mod mock;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Token usage from a single model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Total tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Everything a backend needs to produce the next reply.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Name of the agent asking. Used for logs and simulated replies.
    pub agent: String,
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// What came back from the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// `None` when the model produced no text (blocked, filtered, truncated).
    pub text: Option<String>,
    /// Block or finish reason reported alongside an empty reply.
    pub feedback: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// A generative language model. Could be Gemini, a dry-run stand-in, or a test script.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Short label for banners and logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<Reply>;
}
