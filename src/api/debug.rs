//! WebSocket feed of debug log entries

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
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::cook::DebugEntry;

/// Outgoing WebSocket message to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebugWsOutgoing {
    /// Log contents at connect time
    Snapshot { entries: Vec<DebugEntry> },
    /// Newly appended entry; scroll to it
    Entry(DebugEntry),
    /// No cook session is open, or it closed
    Closed,
}

/// Build debug WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Sink = futures::stream::SplitSink<WebSocket, Message>;

/// Send one message; `false` once the client is gone
async fn send(sender: &mut Sink, msg: &DebugWsOutgoing) -> bool {
    match serde_json::to_string(msg) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(_) => true,
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(session) = state.active_session().await else {
        send(&mut sender, &DebugWsOutgoing::Closed).await;
        return;
    };

    let mut rx = session.subscribe_debug().await;
    let entries = session.debug_entries().await;
    // the receiver alone must not keep the session alive
    drop(session);

    if !send(&mut sender, &DebugWsOutgoing::Snapshot { entries }).await {
        return;
    }

    tracing::debug!("debug WebSocket connected");

    let mut broadcast_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(entry) => {
                    if !send(&mut sender, &DebugWsOutgoing::Entry(entry)).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "debug WebSocket lagged");
                }
                Err(RecvError::Closed) => {
                    send(&mut sender, &DebugWsOutgoing::Closed).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut broadcast_task => recv_task.abort(),
        _ = &mut recv_task => broadcast_task.abort(),
    }

    tracing::debug!("debug WebSocket disconnected");
}
