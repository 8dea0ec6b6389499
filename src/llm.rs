use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use nanoid::nanoid;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use tracing::debug;

use crate::agent::AgentError;
use crate::transcript::{FunctionCall, Message, ToolCall};

/// A model reply: optional free text plus tool invocations in emitted order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self { content: None, tool_calls }
    }

    /// The reply as it goes into the transcript, call ids included.
    pub fn to_message(&self) -> Message {
        Message::Assistant { content: self.content.clone(), tool_calls: self.tool_calls.clone() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &Value) -> Result<AssistantReply, AgentError>;
}

// ========================= Chat Completions Client =========================

#[derive(Clone)]
pub struct ChatConfig {
    pub api_base: String, // e.g. "https://api.together.xyz/v1"
    pub api_key: String,  // env TOGETHER_API_KEY
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: env::var("TOGETHER_BASE_URL").unwrap_or_else(|_| "https://api.together.xyz/v1".into()),
            api_key: env::var("TOGETHER_API_KEY").unwrap_or_default(),
            model: env::var("TOGETHER_MODEL")
                .unwrap_or_else(|_| "meta-llama/Llama-3.2-90B-Vision-Instruct-Turbo".into()),
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    cfg: ChatConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Deserialize)]
struct RawToolCall {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    function: RawFunction,
}

#[derive(Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl ChatClient {
    pub fn new(cfg: ChatConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            bail!("TOGETHER_API_KEY missing");
        }
        Ok(Self { http: Client::new(), cfg })
    }

    /// Build from `TOGETHER_*` environment variables; a missing key is fatal.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::new(ChatConfig::default()).map_err(|e| AgentError::Config(e.to_string()))
    }

    async fn request(&self, messages: &[Message], tools: &Value) -> Result<AssistantReply> {
        let url = format!("{}/chat/completions", self.cfg.api_base.trim_end_matches('/'));
        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "tools": tools,
        });
        debug!(model = %self.cfg.model, messages = messages.len(), "chat completion request");

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("inference service error {}: {}", status, text);
        }
        Self::parse_reply(&text)
    }

    fn parse_reply(text: &str) -> Result<AssistantReply> {
        let resp: CompletionResponse =
            serde_json::from_str(text).context("failed to parse chat completion JSON")?;
        let message = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("completion has no choices")?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|raw| ToolCall {
                id: raw.id.filter(|id| !id.is_empty()).unwrap_or_else(|| format!("call_{}", nanoid!(12))),
                kind: raw.kind.unwrap_or_else(|| "function".into()),
                function: FunctionCall {
                    name: raw.function.name,
                    arguments: match raw.function.arguments {
                        // OpenAI-style providers send a JSON string, a few send the object.
                        Some(Value::String(s)) => s,
                        Some(Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    },
                },
            })
            .collect();

        Ok(AssistantReply { content: message.content, tool_calls })
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[Message], tools: &Value) -> Result<AssistantReply, AgentError> {
        self.request(messages, tools)
            .await
            .map_err(|e| AgentError::Model(format!("{:#}", e)))
    }
}
