//! WebSocket upgrade + message loop. One connection owns one `Session`.
//!
//! Client messages are parsed as JSON and applied through core logic. Replies
//! and background results share one outbox channel, drained by the same loop
//! that reads the socket, so every write happens here.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, error, instrument, debug};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::{handle_client_message, push_view, SharedSession};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "coach_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let session: SharedSession = Arc::new(Mutex::new(state.new_session()));
  let session_id = session.lock().await.id.clone();
  info!(target: "coach_backend", %session_id, "WebSocket connected");

  let (out, mut outbox) = mpsc::unbounded_channel::<ServerWsMessage>();
  push_view(&session, &out).await;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(parsed) => {
              debug!(target: "coach_backend", %session_id, "WS received: {:?}", &parsed);
              handle_client_message(&state, &session, &out, parsed).await;
            }
            Err(e) => {
              let _ = out.send(ServerWsMessage::error(format!("Invalid JSON: {}", e)));
            }
          },
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(reply) = outbox.recv() => {
        let text = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });
        if let Err(e) = socket.send(Message::Text(text)).await {
          error!(target: "coach_backend", %session_id, error = %e, "WS send error");
          break;
        }
      }
    }
  }

  // Closing the outbox tells in-flight tasks to drop their results.
  drop(outbox);
  info!(target: "coach_backend", %session_id, "WebSocket disconnected");
}
