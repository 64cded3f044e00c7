use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// One line of dialogue as it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub message: String,
}

/// A transcript entry as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub turn: usize,
    pub speaker: String,
    pub message: String,
}

/// The on-disk shape of a finished conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFile {
    pub agents: Vec<AgentConfig>,
    pub conversation: Vec<Entry>,
}

impl TranscriptFile {
    /// Pair consecutive utterances into numbered turns (1, 1, 2, 2, ...).
    pub fn new(agents: Vec<AgentConfig>, utterances: &[Utterance]) -> Self {
        let conversation = utterances
            .iter()
            .enumerate()
            .map(|(i, u)| Entry {
                turn: i / 2 + 1,
                speaker: u.speaker.clone(),
                message: u.message.clone(),
            })
            .collect();
        Self {
            agents,
            conversation,
        }
    }

    /// Pretty JSON with four-space indentation. Non-ASCII is written as-is.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
