//! AI enhancement gateway: an optional external advisor that may override the
//! baseline word or quiz mode for a turn.
//!
//! Every call goes through `consult_gateway`, which is the failure boundary:
//! unavailability, errors, timeouts and malformed overrides all degrade to the
//! baseline turn with `ai_enhanced = false`. Nothing here returns an error to
//! the mode services.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{ChallengeMode, QuizMode, Word, WordProgress};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(4000);

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway unavailable")]
  Unavailable,
  #[error("gateway timed out after {0:?}")]
  Timeout(Duration),
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("HTTP {status}: {body}")]
  Http { status: reqwest::StatusCode, body: String },
  #[error("malformed response: {0}")]
  Malformed(String),
}

/// Session facts the advisor sees alongside the baseline choice.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiContext {
  pub mode: ChallengeMode,
  pub words_completed: usize,
  pub target_words: usize,
  pub current_streak: u32,
  pub difficulty: f64,
  pub recent_accuracy: Option<f64>,
  /// Alternative word ids the advisor may pick from.
  pub candidate_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRequest {
  pub word: Word,
  pub baseline_mode: QuizMode,
  pub context: AiContext,
  pub progress: Option<WordProgress>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementResponse {
  #[serde(default)]
  pub intervention_needed: bool,
  #[serde(default)]
  pub selected_word_id: Option<String>,
  #[serde(default)]
  pub ai_recommended_mode: Option<String>,
  #[serde(default)]
  pub reasoning: Vec<String>,
}

#[async_trait]
pub trait AiGateway: Send + Sync {
  /// Queried once per session at initialize; the answer is cached.
  fn is_available(&self) -> bool;

  async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResponse, GatewayError>;
}

/// Default gateway: never available, never intervenes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullGateway;

#[async_trait]
impl AiGateway for NullGateway {
  fn is_available(&self) -> bool {
    false
  }

  async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancementResponse, GatewayError> {
    Ok(EnhancementResponse::default())
  }
}

/// Outcome of consulting the gateway: either the baseline or a validated override.
#[derive(Clone, Debug)]
pub struct Enhancement {
  pub word: Word,
  pub quiz_mode: QuizMode,
  pub ai_enhanced: bool,
  pub reasoning: Vec<String>,
}

impl Enhancement {
  fn baseline(word: Word, quiz_mode: QuizMode) -> Self {
    Self { word, quiz_mode, ai_enhanced: false, reasoning: Vec::new() }
  }
}

fn apply_override(
  response: EnhancementResponse,
  baseline: &EnhancementRequest,
  pool: &[Word],
) -> Result<Option<Enhancement>, GatewayError> {
  if !response.intervention_needed {
    return Ok(None);
  }

  let word = match response.selected_word_id.as_deref() {
    Some(id) => pool
      .iter()
      .find(|w| w.id == id)
      .cloned()
      .ok_or_else(|| GatewayError::Malformed(format!("selected word '{id}' is not in scope")))?,
    None => baseline.word.clone(),
  };

  let quiz_mode = match response.ai_recommended_mode.as_deref() {
    Some(tag) => QuizMode::parse(tag).ok_or_else(|| GatewayError::Malformed(format!("unknown quiz mode '{tag}'")))?,
    None => baseline.baseline_mode,
  };

  Ok(Some(Enhancement { word, quiz_mode, ai_enhanced: true, reasoning: response.reasoning }))
}

/// Ask the gateway for an override, never failing.
pub async fn consult_gateway(
  gateway: &dyn AiGateway,
  available: bool,
  timeout: Duration,
  pool: &[Word],
  request: EnhancementRequest,
) -> Enhancement {
  if !available {
    return Enhancement::baseline(request.word, request.baseline_mode);
  }

  let outcome = match tokio::time::timeout(timeout, gateway.enhance(&request)).await {
    Ok(Ok(resp)) => apply_override(resp, &request, pool),
    Ok(Err(e)) => Err(e),
    Err(_) => Err(GatewayError::Timeout(timeout)),
  };

  match outcome {
    Ok(Some(enhanced)) => {
      info!(
        target: "gateway",
        baseline_word = %request.word.id,
        word = %enhanced.word.id,
        baseline_mode = request.baseline_mode.as_str(),
        mode = enhanced.quiz_mode.as_str(),
        "AI override accepted"
      );
      enhanced
    }
    Ok(None) => {
      debug!(target: "gateway", word = %request.word.id, "No intervention; using baseline");
      Enhancement::baseline(request.word, request.baseline_mode)
    }
    Err(e) => {
      warn!(target: "gateway", word = %request.word.id, error = %e, "AI enhancement failed; using baseline");
      Enhancement::baseline(request.word, request.baseline_mode)
    }
  }
}
