//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Turn results go out as the engine's own `ChallengeResult`/`CompletionResult`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChallengeConfig, ChallengeContext, ChallengeMode, ChallengeResult, CompletionResult, Metadata};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartSession {
    #[serde(flatten)]
    body: StartSessionIn,
  },
  NextWord {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    #[serde(default)]
    context: ChallengeContext,
  },
  Complete {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    #[serde(flatten)]
    body: CompleteIn,
  },
  Reset {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
  },
  EndSession {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
  },
  SessionFailed {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  SessionStarted {
    #[serde(flatten)]
    out: StartSessionOut,
  },
  Challenge {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    result: ChallengeResult,
  },
  Completion {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    result: CompletionResult,
  },
  SessionReset {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
  },
  SessionEnded {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
  },
  FailedStatus {
    #[serde(flatten)]
    out: FailedOut,
  },
  Error {
    #[serde(flatten)]
    out: ErrorOut,
  },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
  pub mode: ChallengeMode,
  #[serde(flatten)]
  pub config: ChallengeConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionOut {
  pub session_id: Uuid,
  pub mode: ChallengeMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteIn {
  pub word_id: String,
  pub correct: bool,
  #[serde(default)]
  pub time_spent_ms: u64,
  #[serde(default)]
  pub metadata: Option<Metadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOut {
  pub session_id: Uuid,
  pub mode: ChallengeMode,
  pub failed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub ok: bool,
  pub ai_available: bool,
  pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub code: &'static str,
  pub message: String,
}
