//! Minimal OpenAI-compatible client implementing `CompletionService`.
//!
//! We only call chat.completions and request either plain text or a
//! schema-constrained JSON object. Calls are instrumented and log model names,
//! latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::gateway::{CompletionService, GatewayError};

/// Key used when an array-root schema has to be wrapped in an object.
const WRAP_KEY: &str = "items";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(30);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// One chat.completions round-trip; returns the first choice's content.
  async fn chat(&self, prompt: &str, response_format: Option<ResponseFormat>) -> Result<String, GatewayError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: 0.7,
      response_format,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "olympiad-coach/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| GatewayError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GatewayError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GatewayError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    Ok(body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default())
  }
}

#[async_trait]
impl CompletionService for OpenAI {
  fn name(&self) -> &str { &self.model }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete_text(&self, prompt: &str) -> Result<String, GatewayError> {
    self.chat(prompt, None).await
  }

  #[instrument(level = "info", skip(self, prompt, schema), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete_json(&self, prompt: &str, schema_name: &str, schema: &Value) -> Result<Value, GatewayError> {
    let (wire_schema, wrapped) = wrap_schema(schema);
    let format = ResponseFormat {
      r#type: "json_schema".into(),
      json_schema: Some(JsonSchemaSpec { name: schema_name.into(), schema: wire_schema }),
    };
    let text = self.chat(prompt, Some(format)).await?;
    if text.trim().is_empty() {
      return Err(GatewayError::EmptyResponse);
    }
    let value: Value = serde_json::from_str(&text).map_err(|e| GatewayError::Decode(format!("JSON parse error: {}", e)))?;
    if wrapped { unwrap_value(value) } else { Ok(value) }
  }
}

/// The provider only accepts object roots; array schemas travel as `{items: [...]}`.
fn wrap_schema(schema: &Value) -> (Value, bool) {
  if schema.get("type").and_then(Value::as_str) == Some("object") {
    (schema.clone(), false)
  } else {
    let wrapped = json!({
      "type": "object",
      "properties": { WRAP_KEY: schema },
      "required": [WRAP_KEY]
    });
    (wrapped, true)
  }
}

/// Undo `wrap_schema`; a bare array is accepted too since some providers ignore the wrapper.
fn unwrap_value(value: Value) -> Result<Value, GatewayError> {
  match value {
    Value::Object(mut map) => map
      .remove(WRAP_KEY)
      .ok_or_else(|| GatewayError::Decode(format!("missing '{WRAP_KEY}' wrapper"))),
    arr @ Value::Array(_) => Ok(arr),
    other => Err(GatewayError::Decode(format!("unexpected JSON root: {other}"))),
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")] r#type: String,
  #[serde(skip_serializing_if = "Option::is_none")] json_schema: Option<JsonSchemaSpec>,
}
#[derive(Serialize)]
struct JsonSchemaSpec { name: String, schema: Value }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
