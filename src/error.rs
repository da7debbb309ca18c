//! Error taxonomy for the engine. Recoverable conditions (selection exhaustion,
//! gateway failures) are handled where they occur and never appear here.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::ChallengeMode;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("{mode} session used before initialize()")]
  NotInitialized { mode: ChallengeMode },
  #[error("no words available for language '{language}' (module: {module:?})")]
  NoWordsAvailable { language: String, module: Option<String> },
  #[error("session has failed; reset() before requesting more words")]
  SessionFailed,
  #[error("session {session_id} already has a request in flight")]
  SessionBusy { session_id: Uuid },
  #[error("unknown session {session_id}")]
  UnknownSession { session_id: Uuid },
  #[error("invalid challenge config: {0}")]
  InvalidConfig(String),
}

impl EngineError {
  /// Stable machine-readable tag for transports.
  pub fn code(&self) -> &'static str {
    match self {
      EngineError::NotInitialized { .. } => "not_initialized",
      EngineError::NoWordsAvailable { .. } => "no_words_available",
      EngineError::SessionFailed => "session_failed",
      EngineError::SessionBusy { .. } => "session_busy",
      EngineError::UnknownSession { .. } => "unknown_session",
      EngineError::InvalidConfig(_) => "invalid_config",
    }
  }
}

pub type EngineResult<T> = Result<T, EngineError>;
