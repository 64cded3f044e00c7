//! Conversation configuration loaded from a JSON file.
//!
//! ```json
//! {
//!   "agents": [
//!     { "name": "Interviewer", "model": "gemini-2.5-flash", "temperature": 0.7,
//!       "ctx_size": 2048, "system_prompt": "" },
//!     { "name": "Technician", "model": "gemini-2.5-flash", "temperature": 0.9,
//!       "ctx_size": 2048, "system_prompt": "" }
//!   ],
//!   "settings": { "initial_message": "Start the debriefing call." }
//! }
//! ```
//!
//! The batch driver overwrites both system prompts per combination, so the
//! ones in the file only matter for the output header of a single run.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// One conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    /// Maximum output tokens per reply.
    pub ctx_size: u32,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub initial_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub settings: Settings,
}

impl Config {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Fail unless there is an interviewer and a technician.
    pub fn require_pair(&self) -> Result<()> {
        if self.agents.len() < 2 {
            bail!(
                "config defines {} agent(s); an interviewer and a technician are required",
                self.agents.len()
            );
        }
        Ok(())
    }

    pub fn interviewer(&self) -> Option<&AgentConfig> {
        self.agents.first()
    }

    pub fn technician(&self) -> Option<&AgentConfig> {
        self.agents.get(1)
    }

    /// The opening instruction for the interviewer, empty when unset.
    pub fn initial_message(&self) -> &str {
        self.settings.initial_message.as_deref().unwrap_or("")
    }

    /// Copy of this config with the two speaking agents' system prompts replaced.
    pub fn with_prompts(&self, interviewer: String, technician: String) -> Result<Self> {
        self.require_pair()?;
        let mut config = self.clone();
        config.agents[0].system_prompt = interviewer;
        config.agents[1].system_prompt = technician;
        Ok(config)
    }
}
