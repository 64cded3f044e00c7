//! A single conversational agent: its own history plus a shared model backend.
//!
//! [`Agent::respond`] never fails. Timeouts, backend errors and empty replies
//! all become bracketed marker strings, so a transcript always has one entry
//! per turn and the caller decides whether to keep talking.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AgentConfig;
use crate::llm::{GenerateRequest, Llm, Message, Role, TokenUsage};

pub struct Agent {
    config: AgentConfig,
    llm: Arc<dyn Llm>,
    timeout: Duration,
    messages: Vec<Message>,
    usage: TokenUsage,
}

impl Agent {
    /// A non-empty system prompt becomes the first history message.
    pub fn new(config: AgentConfig, llm: Arc<dyn Llm>, timeout: Duration) -> Self {
        let mut messages = Vec::new();
        if !config.system_prompt.is_empty() {
            messages.push(Message::new(Role::System, config.system_prompt.clone()));
        }
        Self {
            config,
            llm,
            timeout,
            messages,
            usage: TokenUsage::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The settings this agent was built from, for the transcript header.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Ask the model for the next reply given the current history.
    pub async fn respond(&mut self) -> String {
        if self.messages.is_empty() {
            tracing::warn!(agent = %self.config.name, "no messages in history");
            return format!(
                "[ERROR: no messages available for agent {}]",
                self.config.name
            );
        }

        let request = GenerateRequest {
            agent: self.config.name.clone(),
            model: self.config.model.clone(),
            system_prompt: self.config.system_prompt.clone(),
            messages: self.messages.clone(),
            temperature: self.config.temperature,
            max_output_tokens: self.config.ctx_size,
        };

        let reply = match tokio::time::timeout(self.timeout, self.llm.generate(&request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(agent = %self.config.name, error = %e, "model call failed");
                return format!("[API ERROR for agent {}: {}]", self.config.name, e);
            }
            Err(_) => {
                tracing::warn!(
                    agent = %self.config.name,
                    timeout_secs = self.timeout.as_secs(),
                    "model call timed out"
                );
                return format!("[ERROR: TIMEOUT for agent {}]", self.config.name);
            }
        };

        if let Some(usage) = reply.usage {
            self.usage.add(usage);
        }

        match reply.text {
            Some(text) if !text.is_empty() => text,
            _ => {
                let feedback = reply.feedback.as_deref().unwrap_or("N/A");
                tracing::warn!(agent = %self.config.name, feedback, "empty or blocked reply");
                format!("[EMPTY OR BLOCKED RESPONSE: {}]", feedback)
            }
        }
    }
}
