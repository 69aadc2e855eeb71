//! WebSocket endpoint for the browser camera peer
//!
//! The peer receives `{"type":"start","facing_mode":...,"audio":false}` and
//! `{"type":"stop"}` commands and answers with binary JPEG/PNG frames.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};

use super::ApiState;
use crate::camera::{PeerConnection, RemoteCamera};

/// Build camera peer WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let camera = state.remote_camera.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, camera))
}

async fn handle_socket(socket: WebSocket, camera: RemoteCamera) {
    let (mut sender, mut receiver) = socket.split();
    let PeerConnection { id, mut commands } = camera.connect_peer();

    // Forward device commands to the peer
    let mut command_task = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let Ok(text) = serde_json::to_string(&command) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Frames from the peer
    let frames = camera.clone();
    let mut frame_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Binary(bytes) => {
                    if let Err(e) = frames.push_frame(&bytes) {
                        tracing::debug!(peer_id = id, error = %e, "dropping undecodable frame");
                    }
                }
                Message::Close(_) => {
                    tracing::info!(peer_id = id, "camera peer closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut command_task => frame_task.abort(),
        _ = &mut frame_task => command_task.abort(),
    }

    camera.disconnect_peer(id);
}
