//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a learner's WebSocket
//! connection. One connection is one [`LearnerConnection`]. Client messages and
//! quiz timer events are handled by the same loop, so every reply is sent from
//! one place.

use crate::error::ApiError;
use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    session::LearnerConnection,
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn send(sender: &mut WsSender, message: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(message).map_err(|e| ApiError::Internal(e.to_string()))?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn send_all(sender: &mut WsSender, messages: &[ServerMessage]) -> bool {
    for message in messages {
        if let Err(e) = send(sender, message).await {
            error!("Failed to send message to client: {}", e);
            return false;
        }
    }
    true
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New learner WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    let module_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(init_json.as_str()) {
                Ok(ClientMessage::Init { module_id }) => module_id,
                _ => {
                    error!("First message was not a valid Init message.");
                    let _ = send(&mut sender, &ServerMessage::error("Expected an init message")).await;
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    let (mut connection, greeting) = match LearnerConnection::open(app_state, module_id).await {
        Ok(opened) => opened,
        Err(message) => {
            let _ = send(&mut sender, &message).await;
            return;
        }
    };

    // --- 2. Main Message Loop ---
    let mut connected = send_all(&mut sender, &greeting).await;
    while connected {
        let replies = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => connection.handle_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive failed: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            Some(event) = connection.next_quiz_event() => connection.handle_quiz_event(event).await,
        };
        connected = send_all(&mut sender, &replies).await;
    }

    // --- 3. Cleanup ---
    connection.close().await;
    info!("Learner WebSocket connection closed.");
}
