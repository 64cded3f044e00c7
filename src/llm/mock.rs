use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{GenerateRequest, Llm, Reply};

/// One scripted behaviour for a single call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(Reply),
    Fail(String),
    /// Sleep before replying, to exercise timeouts.
    Stall(Duration, Reply),
}

/// A scripted backend for tests. Plays back pre-defined behaviours in order
/// and records every request it sees.
pub struct MockLlm {
    script: Vec<Scripted>,
    index: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlm {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: plain text replies in order.
    pub fn replies<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|t| Scripted::Reply(Reply::text(t)))
                .collect(),
        )
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Reply> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("MockLlm: no more replies (called {} times)", i + 1))?;
        match step {
            Scripted::Reply(reply) => Ok(reply.clone()),
            Scripted::Fail(message) => Err(anyhow::anyhow!("{}", message)),
            Scripted::Stall(delay, reply) => {
                tokio::time::sleep(*delay).await;
                Ok(reply.clone())
            }
        }
    }
}
