use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::consts::{API_BASE_VAR, API_KEY_VAR};

use super::{GenerateRequest, Llm, Reply, Role, TokenUsage};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A backend that calls the Gemini `generateContent` endpoint.
pub struct GeminiLlm {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiLlm {
    /// Base URL from `GEMINI_API_BASE` (if set). The key is looked up from
    /// `GOOGLE_API_KEY` on every call.
    pub fn from_env() -> Self {
        let base_url = std::env::var(API_BASE_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: None,
        }
    }

    /// Pin an explicit key instead of reading the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("no Gemini credentials found. Set {}.", API_KEY_VAR),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_request(request: &GenerateRequest) -> ApiRequest<'_> {
        let system_instruction = (!request.system_prompt.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: &request.system_prompt,
            }],
        });

        // Gemini only knows "user" and "model"; the system prompt rides along as a user turn.
        let contents = request
            .messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| Content {
                role: Some(match m.role {
                    Role::Model => "model",
                    Role::System | Role::User => "user",
                }),
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        ApiRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    fn parse_response(resp: ApiResponse) -> Reply {
        let candidate = resp.candidates.into_iter().next();

        let text: String = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
        let feedback = match block_reason {
            Some(reason) => Some(reason),
            None if text.is_empty() => candidate.and_then(|c| c.finish_reason),
            None => None,
        };

        let usage = resp.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        Reply {
            text: (!text.is_empty()).then_some(text),
            feedback,
            usage,
        }
    }
}

#[async_trait]
impl Llm for GeminiLlm {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Reply> {
        let api_key = self.api_key()?;
        let body = Self::build_request(request);

        tracing::debug!(
            agent = %request.agent,
            model = %request.model,
            messages = body.contents.len(),
            "calling Gemini"
        );

        let resp = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Gemini API error ({}): {}", status, text);
        }

        let api_resp: ApiResponse = resp.json().await?;
        let reply = Self::parse_response(api_resp);

        if let Some(usage) = reply.usage {
            tracing::debug!(
                agent = %request.agent,
                input = usage.input_tokens,
                output = usage.output_tokens,
                "token usage"
            );
        }

        Ok(reply)
    }
}

// --- API types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::agent::Agent;
    use crate::config::AgentConfig;
    use crate::llm::Message;

    fn request(messages: Vec<Message>) -> GenerateRequest {
        GenerateRequest {
            agent: "Assistant".to_string(),
            model: "gemini-2.5-flash".to_string(),
            system_prompt: "You interview technicians.".to_string(),
            messages,
            temperature: 0.7,
            max_output_tokens: 512,
        }
    }

    fn parse(json: &str) -> Reply {
        GeminiLlm::parse_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn build_request_maps_roles() {
        let req = request(vec![
            Message::new(Role::System, "You interview technicians."),
            Message::new(Role::User, "Start."),
            Message::new(Role::Model, "Good morning."),
            Message::new(Role::User, "Morning."),
        ]);
        let body = serde_json::to_value(GeminiLlm::build_request(&req)).unwrap();

        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "user", "model", "user"]);
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Good morning.");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You interview technicians."
        );
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn build_request_generation_config() {
        let body = serde_json::to_value(GeminiLlm::build_request(&request(vec![]))).unwrap();
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 1e-6);
    }

    #[test]
    fn build_request_skips_empty_messages() {
        let req = request(vec![
            Message::new(Role::User, ""),
            Message::new(Role::Model, "Hello."),
        ]);
        let body = serde_json::to_value(GeminiLlm::build_request(&req)).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn build_request_omits_empty_system_instruction() {
        let mut req = request(vec![Message::new(Role::User, "hi")]);
        req.system_prompt.clear();
        let body = serde_json::to_value(GeminiLlm::build_request(&req)).unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn endpoint_includes_model() {
        let llm = GeminiLlm::from_env().with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            llm.endpoint("gemini-2.5-pro"),
            "http://localhost:8080/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn explicit_key_wins() {
        let llm = GeminiLlm::from_env().with_api_key("test-key");
        assert_eq!(llm.api_key().unwrap(), "test-key");
    }

    #[test]
    fn parse_text_and_usage() {
        let reply = parse(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Good "}, {"text": "morning."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8, "totalTokenCount": 128}
            }"#,
        );
        assert_eq!(reply.text.as_deref(), Some("Good morning."));
        assert!(reply.feedback.is_none());
        assert_eq!(
            reply.usage,
            Some(TokenUsage {
                input_tokens: 120,
                output_tokens: 8
            })
        );
    }

    #[test]
    fn parse_blocked_prompt() {
        let reply = parse(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);
        assert!(reply.text.is_none());
        assert_eq!(reply.feedback.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn parse_empty_candidate_reports_finish_reason() {
        let reply = parse(r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#);
        assert!(reply.text.is_none());
        assert_eq!(reply.feedback.as_deref(), Some("MAX_TOKENS"));
    }

    #[test]
    fn parse_empty_body() {
        let reply = parse("{}");
        assert_eq!(reply, Reply::default());
    }

    fn local_llm(base_url: String, api_key: Option<&str>) -> GeminiLlm {
        GeminiLlm {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            base_url,
            api_key: api_key.map(str::to_string),
        }
    }

    fn technician(llm: GeminiLlm) -> Agent {
        let mut agent = Agent::new(
            AgentConfig {
                name: "Marco".to_string(),
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.9,
                ctx_size: 256,
                system_prompt: "You are Marco.".to_string(),
            },
            Arc::new(llm),
            Duration::from_secs(5),
        );
        agent.add_message(Role::User, "Good morning, Marco.");
        agent
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    /// Answer one HTTP request with `status` and `body`; the task yields the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&raw).into_owned()
        });

        (base_url, server)
    }

    fn request_body(raw: &str) -> serde_json::Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn server_error_becomes_agent_marker() {
        let (base_url, server) =
            serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let mut agent = technician(local_llm(base_url, Some("k1")));

        let reply = agent.respond().await;

        assert_eq!(
            reply,
            r#"[API ERROR for agent Marco: Gemini API error (500 Internal Server Error): {"error":"boom"}]"#
        );
        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent "));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: k1\r\n"));
    }

    #[tokio::test]
    async fn success_is_decoded_and_usage_accumulated() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Buongiorno"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":1}}"#,
        )
        .await;
        let mut agent = technician(local_llm(base_url, Some("k1")));

        assert_eq!(agent.respond().await, "Buongiorno");
        assert_eq!(
            agent.usage(),
            TokenUsage {
                input_tokens: 3,
                output_tokens: 1
            }
        );

        let body = request_body(&server.await.unwrap());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are Marco.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "You are Marco.");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Good morning, Marco.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }

    #[tokio::test]
    async fn missing_key_becomes_agent_marker() {
        // Only meaningful when the environment does not supply a key.
        if std::env::var(API_KEY_VAR).is_ok_and(|k| !k.trim().is_empty()) {
            return;
        }
        let mut agent = technician(local_llm("http://127.0.0.1:9/v1beta".to_string(), None));

        assert_eq!(
            agent.respond().await,
            "[API ERROR for agent Marco: no Gemini credentials found. Set GOOGLE_API_KEY.]"
        );
    }
}
