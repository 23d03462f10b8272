//! OpenAI-compatible chat completion client.
//!
//! [`ChatClient`] implements [`LanguageModel`] against any endpoint that
//! speaks the `POST /chat/completions` protocol (Groq by default). Two
//! models are configured: the reasoning model for pipeline stages and the
//! chat model for classification and personas; each request picks one via
//! its [`ModelTier`].
//!
//! Requests are sent once. There is no retry loop: a failed call is
//! reported as an [`LlmError`] and the calling stage substitutes its own
//! fallback. The HTTP client's timeout surfaces as a transport error.
//!
//! Reasoning models wrap their chain of thought in `<think>…</think>`.
//! [`strip_reasoning`] removes every such block and is applied to all
//! model text shown to an end user.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::traits::{CompletionRequest, LanguageModel, ModelTier};

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    chat_model: String,
    api_key: String,
}

impl ChatClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if the environment variable named
    /// by `api_key_env` is unset or empty.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            chat_model: config.chat_model.clone(),
            api_key,
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Reasoning => &self.model,
            ModelTier::Chat => &self.chat_model,
        }
    }
}

/// Resolve the chat completions endpoint from a base URL.
fn endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

fn request_body(model: &str, request: &CompletionRequest) -> Value {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    messages.push(json!({ "role": "system", "content": request.system }));
    for turn in &request.turns {
        messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
    }
    json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
    })
}

/// Extract `choices[0].message.content`.
fn parse_reply(json: &Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or(LlmError::EmptyReply)
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let model = self.model_for(request.tier);
        let body = request_body(model, request);
        let started = Instant::now();

        let resp = self
            .client
            .post(endpoint(&self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: Value = resp.json().await?;
        let content = parse_reply(&json)?;
        info!(
            model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model call completed"
        );
        debug!(model, reply = %content, "raw model reply");
        Ok(content)
    }
}

fn reasoning_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"))
}

/// Remove every `<think>…</think>` block and trim the result.
///
/// An unterminated `<think>` (reply cut off mid-thought) drops everything
/// from the opening tag on, and a stray closing tag is removed.
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = reasoning_block().replace_all(text, "");
    let mut cleaned = match without_blocks.find("<think>") {
        Some(start) => without_blocks[..start].to_string(),
        None => without_blocks.into_owned(),
    };
    cleaned = cleaned.replace("</think>", "");
    cleaned.trim().to_string()
}
