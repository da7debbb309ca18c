//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the session manager. We reply with a single JSON message per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::EngineError;
use crate::protocol::{ClientWsMessage, ErrorOut, FailedOut, ServerWsMessage, StartSessionOut};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "caatuu_engine", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "caatuu_engine", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "caatuu_engine", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { out: ErrorOut { code: "invalid_json", message: format!("Invalid JSON: {}", e) } },
        };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "code": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "caatuu_engine", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "caatuu_engine", "WebSocket disconnected");
}

fn ws_error(e: EngineError) -> ServerWsMessage {
  ServerWsMessage::Error { out: ErrorOut { code: e.code(), message: e.to_string() } }
}

#[instrument(level = "info", skip(state))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let sessions = &state.sessions;
  let outcome = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::StartSession { body } => sessions
      .start_session(body.mode, body.config)
      .await
      .map(|session_id| ServerWsMessage::SessionStarted { out: StartSessionOut { session_id, mode: body.mode } }),

    ClientWsMessage::NextWord { session_id, context } => sessions.next_word(session_id, context).await.map(|result| {
      info!(target: "challenge", %session_id, word = ?result.word.as_ref().map(|w| w.id.as_str()), "WS next word served");
      ServerWsMessage::Challenge { session_id, result }
    }),

    ClientWsMessage::Complete { session_id, body } => sessions
      .record_completion(session_id, &body.word_id, body.correct, body.time_spent_ms, body.metadata.as_ref())
      .await
      .map(|result| ServerWsMessage::Completion { session_id, result }),

    ClientWsMessage::Reset { session_id } => {
      sessions.reset_session(session_id).await.map(|_| ServerWsMessage::SessionReset { session_id })
    }

    ClientWsMessage::EndSession { session_id } => {
      sessions.end_session(session_id).await.map(|_| ServerWsMessage::SessionEnded { session_id })
    }

    ClientWsMessage::SessionFailed { session_id } => match sessions.session_mode(session_id).await {
      Ok(mode) => sessions
        .has_session_failed(session_id)
        .await
        .map(|failed| ServerWsMessage::FailedStatus { out: FailedOut { session_id, mode, failed } }),
      Err(e) => Err(e),
    },
  };
  outcome.unwrap_or_else(ws_error)
}
