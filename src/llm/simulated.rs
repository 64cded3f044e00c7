use anyhow::Result;
use async_trait::async_trait;

use super::{GenerateRequest, Llm, Reply};

/// Dry-run backend. Answers every call with a placeholder without touching the network.
pub struct SimulatedLlm;

impl SimulatedLlm {
    pub fn reply_for(agent: &str) -> String {
        format!("[SIMULATED RESPONSE for {}]", agent)
    }
}

#[async_trait]
impl Llm for SimulatedLlm {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Reply> {
        tracing::debug!(agent = %request.agent, model = %request.model, "simulated reply");
        Ok(Reply::text(Self::reply_for(&request.agent)))
    }
}
