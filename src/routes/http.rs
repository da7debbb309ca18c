//! HTTP endpoint handlers. Thin wrappers that forward to the session manager;
//! engine errors become JSON error bodies with a matching status code.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::ChallengeContext;
use crate::error::EngineError;
use crate::protocol::*;
use crate::state::AppState;

/// `EngineError` carried out of a handler.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self {
    ApiError(e)
  }
}

pub fn status_for(e: &EngineError) -> StatusCode {
  match e {
    EngineError::UnknownSession { .. } => StatusCode::NOT_FOUND,
    EngineError::SessionBusy { .. } | EngineError::SessionFailed | EngineError::NotInitialized { .. } => StatusCode::CONFLICT,
    EngineError::NoWordsAvailable { .. } | EngineError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = status_for(&self.0);
    warn!(target: "caatuu_engine", code = self.0.code(), status = status.as_u16(), error = %self.0, "Request failed");
    (status, Json(ErrorOut { code: self.0.code(), message: self.0.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    ai_available: state.sessions.gateway_available(),
    active_sessions: state.sessions.active_sessions().await,
  })
}

#[instrument(level = "info", skip(state, body), fields(mode = %body.mode, language = %body.config.language))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> Result<(StatusCode, Json<StartSessionOut>), ApiError> {
  let session_id = state.sessions.start_session(body.mode, body.config).await?;
  Ok((StatusCode::CREATED, Json(StartSessionOut { session_id, mode: body.mode })))
}

#[instrument(level = "info", skip(state, ctx), fields(%id, done = ctx.as_ref().map(|c| c.words_completed)))]
pub async fn http_next_word(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  ctx: Option<Json<ChallengeContext>>,
) -> ApiResult<crate::domain::ChallengeResult> {
  let ctx = ctx.map(|Json(c)| c).unwrap_or_default();
  let result = state.sessions.next_word(id, ctx).await?;
  info!(
    target: "challenge",
    %id,
    word = ?result.word.as_ref().map(|w| w.id.as_str()),
    quiz_mode = result.quiz_mode.as_str(),
    ai_enhanced = result.ai_enhanced,
    "HTTP next word served"
  );
  Ok(Json(result))
}

#[instrument(level = "info", skip(state, body), fields(%id, word_id = %body.word_id, correct = body.correct))]
pub async fn http_complete(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CompleteIn>,
) -> ApiResult<crate::domain::CompletionResult> {
  let result = state
    .sessions
    .record_completion(id, &body.word_id, body.correct, body.time_spent_ms, body.metadata.as_ref())
    .await?;
  Ok(Json(result))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_reset(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
  state.sessions.reset_session(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_end_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
  state.sessions.end_session(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_session_failed(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<FailedOut> {
  let mode = state.sessions.session_mode(id).await?;
  let failed = state.sessions.has_session_failed(id).await?;
  Ok(Json(FailedOut { session_id: id, mode, failed }))
}
