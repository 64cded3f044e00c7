pub mod transcript;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::agent::Agent;
use crate::consts::{DEFAULT_MAX_ROUNDS, STOP_PHRASES};
use crate::events::{Event, EventBus};
use crate::llm::{Role, TokenUsage};

pub use transcript::{TranscriptFile, Utterance};

pub struct ConversationConfig {
    /// Technician/interviewer exchanges after the opening greeting.
    pub max_rounds: usize,
    /// Matched case-insensitively against the interviewer's replies.
    pub stop_phrases: Vec<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            stop_phrases: STOP_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Why a conversation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The interviewer said one of the stop phrases.
    StopPhrase(String),
    /// `max_rounds` exchanges happened without a stop phrase.
    TurnLimit,
    /// Fewer than two agents; nothing was said.
    NotEnoughAgents,
}

/// Ping-pong dialogue between an interviewer (agent 0) and a technician (agent 1).
pub struct Conversation {
    agents: Vec<Agent>,
    initial_message: String,
    config: ConversationConfig,
    transcript: Vec<Utterance>,
    events: Option<Arc<EventBus>>,
    label: String,
}

impl Conversation {
    pub fn new(
        agents: Vec<Agent>,
        initial_message: impl Into<String>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            agents,
            initial_message: initial_message.into(),
            config,
            transcript: Vec::new(),
            events: None,
            label: String::new(),
        }
    }

    /// Publish progress on `bus`, tagged with `label`.
    pub fn with_events(mut self, bus: Arc<EventBus>, label: impl Into<String>) -> Self {
        self.events = Some(bus);
        self.label = label.into();
        self
    }

    pub fn transcript(&self) -> &[Utterance] {
        &self.transcript
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Token usage summed over every agent.
    pub fn usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for agent in &self.agents {
            total.add(agent.usage());
        }
        total
    }

    /// Run the dialogue to completion. Model failures surface as marker
    /// strings in the transcript, never as errors.
    pub async fn run(&mut self) -> Termination {
        self.emit(Event::ConversationStarted {
            label: self.label.clone(),
        });

        let termination = self.converse().await;

        tracing::info!(
            label = %self.label,
            utterances = self.transcript.len(),
            termination = ?termination,
            "conversation finished"
        );
        self.emit(Event::ConversationFinished {
            label: self.label.clone(),
            termination: termination.clone(),
            utterances: self.transcript.len(),
        });

        termination
    }

    async fn converse(&mut self) -> Termination {
        if self.agents.len() < 2 {
            tracing::warn!(
                label = %self.label,
                agents = self.agents.len(),
                "need two agents to hold a conversation"
            );
            return Termination::NotEnoughAgents;
        }

        const INTERVIEWER: usize = 0;
        const TECHNICIAN: usize = 1;

        // The interviewer opens from the configured instruction.
        let opening = self.initial_message.clone();
        self.agents[INTERVIEWER].add_message(Role::User, opening);
        self.take_turn(INTERVIEWER, TECHNICIAN).await;

        for round in 0..self.config.max_rounds {
            tracing::debug!(label = %self.label, round = round + 1, "round");

            self.take_turn(TECHNICIAN, INTERVIEWER).await;
            let reply = self.take_turn(INTERVIEWER, TECHNICIAN).await;

            if let Some(phrase) = self.stop_phrase_in(&reply) {
                return Termination::StopPhrase(phrase);
            }
        }

        Termination::TurnLimit
    }

    /// `speaker` replies; the reply is recorded, kept as `model` in the
    /// speaker's history and handed to `listener` as `user`.
    async fn take_turn(&mut self, speaker: usize, listener: usize) -> String {
        let reply = self.agents[speaker].respond().await;
        let name = self.agents[speaker].name().to_string();

        self.transcript.push(Utterance {
            speaker: name.clone(),
            message: reply.clone(),
        });
        self.emit(Event::TurnRecorded {
            label: self.label.clone(),
            turn: (self.transcript.len() - 1) / 2 + 1,
            speaker: name,
            message: reply.clone(),
        });

        self.agents[speaker].add_message(Role::Model, reply.clone());
        self.agents[listener].add_message(Role::User, reply.clone());
        reply
    }

    fn stop_phrase_in(&self, reply: &str) -> Option<String> {
        let lower = reply.to_lowercase();
        self.config
            .stop_phrases
            .iter()
            .find(|phrase| lower.contains(&phrase.to_lowercase()))
            .cloned()
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Save agents and transcript as JSON at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let agents = self.agents.iter().map(|a| a.config().clone()).collect();
        TranscriptFile::new(agents, &self.transcript).write(path)?;
        tracing::info!(path = %path.display(), "transcript saved");
        Ok(())
    }
}
