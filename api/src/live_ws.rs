//! Live results WebSocket handler
//!
//! Frames are JSON text of the form `{"event": ..., "data": ...}`.
//!
//! Client messages:
//! - `join_poll` with the poll id as data (moves the connection to that poll)
//! - `leave_poll`
//! - `ping`
//!
//! Server messages:
//! - `update_results` with `{pollId, votes}` after every accepted vote
//! - `pong`
//! - `error` for frames that do not parse

use crate::ApiState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use livepoll_core::{BroadcastHub, ClientEvent, ServerEvent};
use std::sync::Arc;

/// WebSocket upgrade handler for live poll results
pub async fn live_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let hub = state.service.hub().clone();
    ws.on_upgrade(|socket| handle_live_socket(socket, hub))
}

async fn handle_live_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut rx) = hub.connect().await;

    // Drain this connection's queue onto the socket, in order
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        tracing::warn!(connection = %connection, "socket_send_failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "event_serialize_failed");
                }
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientEvent>(text.as_str()) {
                        Ok(ClientEvent::JoinPoll(poll_id)) => {
                            recv_hub.join(connection, &poll_id).await;
                        }
                        Ok(ClientEvent::LeavePoll) => {
                            recv_hub.leave(connection).await;
                        }
                        Ok(ClientEvent::Ping) => {
                            recv_hub.send_to(connection, ServerEvent::Pong).await;
                        }
                        Err(e) => {
                            tracing::warn!(connection = %connection, error = %e, "bad_client_frame");
                            recv_hub
                                .send_to(
                                    connection,
                                    ServerEvent::Error {
                                        message: "Invalid message format".to_string(),
                                    },
                                )
                                .await;
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                // Pong is sent automatically by axum
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(connection = %connection, error = %e, "socket_error");
                    break;
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.disconnect(connection).await;
}
