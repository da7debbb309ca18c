//! OpenAI-backed enhancement gateway.
//!
//! We only call chat.completions with a strict JSON-object response format.
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Prompts;
use crate::gateway::{AiGateway, EnhancementRequest, EnhancementResponse, GatewayError};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder().timeout(Duration::from_secs(20)).build().ok()?;

    Some(Self { client, api_key, base_url, model, prompts })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(&self, system: &str, user: &str, temperature: f32) -> Result<T, GatewayError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "caatuu-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let body = extract_openai_error(&body).unwrap_or(body);
      return Err(GatewayError::Http { status, body });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "gateway", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first().and_then(|c| c.message.content.clone()).unwrap_or_default();
    parse_json_reply(&text)
  }
}

fn parse_json_reply<T: for<'a> Deserialize<'a>>(text: &str) -> Result<T, GatewayError> {
  serde_json::from_str::<T>(text)
    .map_err(|e| GatewayError::Malformed(format!("{e} in {}", trunc_for_log(text, 80))))
}

#[async_trait]
impl AiGateway for OpenAI {
  fn is_available(&self) -> bool {
    !self.api_key.is_empty()
  }

  #[instrument(level = "info", skip(self, request), fields(word = %request.word.id, mode = %request.context.mode))]
  async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResponse, GatewayError> {
    let user = fill_template(
      &self.prompts.enhance_user_template,
      &[
        ("mode", request.context.mode.as_str()),
        ("word_json", &to_json(&request.word)),
        ("quiz_mode", request.baseline_mode.as_str()),
        ("progress_json", &to_json(&request.progress)),
        ("context_json", &to_json(&request.context)),
      ],
    );

    let start = Instant::now();
    let result = self.chat_json::<EnhancementResponse>(&self.prompts.enhance_system, &user, 0.2).await;
    info!(target: "gateway", elapsed = ?start.elapsed(), ok = result.is_ok(), "Enhancement response received");
    result
  }
}

fn to_json<T: Serialize>(value: &T) -> String {
  serde_json::to_string(value).unwrap_or_else(|_| "null".into())
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
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

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
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_enhancement_reply() {
    let r: EnhancementResponse = parse_json_reply(
      r#"{"interventionNeeded": true, "selectedWordId": "w2", "aiRecommendedMode": "open-answer", "reasoning": ["ready"]}"#,
    )
    .unwrap();
    assert!(r.intervention_needed);
    assert_eq!(r.selected_word_id.as_deref(), Some("w2"));
    assert_eq!(r.ai_recommended_mode.as_deref(), Some("open-answer"));
  }

  #[test]
  fn missing_fields_default_to_no_intervention() {
    let r: EnhancementResponse = parse_json_reply("{}").unwrap();
    assert!(!r.intervention_needed);
    assert!(r.reasoning.is_empty());
  }

  #[test]
  fn non_json_reply_is_malformed() {
    let err = parse_json_reply::<EnhancementResponse>("sure, here you go").unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
  }

  #[test]
  fn extracts_api_error_message() {
    let msg = extract_openai_error(r#"{"error": {"message": "bad key"}}"#);
    assert_eq!(msg.as_deref(), Some("bad key"));
    assert!(extract_openai_error("<html>").is_none());
  }
}
