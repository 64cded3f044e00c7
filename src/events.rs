//! Progress notifications for running conversations.
//!
//! [`Conversation`](crate::conversation::Conversation) publishes here as it
//! records utterances; the CLI listens to mirror them into the debug log.
//! Listeners that fall behind lose old events rather than slowing the driver.

use tokio::sync::broadcast;

use crate::conversation::Termination;

/// `label` is the `persona/scenario` pair the conversation belongs to.
#[derive(Debug, Clone)]
pub enum Event {
    ConversationStarted {
        label: String,
    },
    /// One utterance was appended to the transcript.
    TurnRecorded {
        label: String,
        turn: usize,
        speaker: String,
        message: String,
    },
    ConversationFinished {
        label: String,
        termination: Termination,
        utterances: usize,
    },
}

#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is how many events a slow listener may lag before it starts
    /// missing them.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Publish to every listener; returns how many there were.
    pub fn emit(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
