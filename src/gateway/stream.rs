//! 事件推送：WebSocket 与 SSE
//!
//! 连接建立时订阅该 identity 的事件通道，只推送订阅之后发布的事件。落后过多时跳过丢失的事件。

use std::convert::Infallible;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::{stream, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast;

use super::error::ApiError;
use super::state::GatewayState;
use crate::coordinator::validate_identity;
use crate::events::EventEnvelope;

pub async fn agent_ws(
    ws: WebSocketUpgrade,
    Path(identity): Path<String>,
    State(state): State<GatewayState>,
) -> Result<Response, ApiError> {
    validate_identity(&identity)?;
    let events = state.registry.events();
    let rx = events.subscribe(&identity).await;
    let subscribers = events.subscriber_count(&identity).await;
    tracing::debug!(identity = %identity, subscribers, "WebSocket subscription opened");
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, identity, rx))
        .into_response())
}

async fn handle_socket(
    socket: WebSocket,
    identity: String,
    mut rx: broadcast::Receiver<EventEnvelope>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(identity = %identity, "WebSocket subscriber connected");

    let send_task = tokio::spawn(async move {
        loop {
            let envelope = match rx.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("WebSocket subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let json = match serde_json::to_string(&envelope) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // 客户端消息只用于检测断开
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    send_task.abort();
    tracing::debug!(identity = %identity, "WebSocket subscriber disconnected");
}

pub async fn agent_sse(
    Path(identity): Path<String>,
    State(state): State<GatewayState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate_identity(&identity)?;
    let events = state.registry.events();
    let rx = events.subscribe(&identity).await;
    let subscribers = events.subscriber_count(&identity).await;
    tracing::debug!(identity = %identity, subscribers, "SSE subscription opened");

    let event_stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let Ok(data) = serde_json::to_string(&envelope) else {
                        continue;
                    };
                    let event = Event::default()
                        .event(envelope.event.kind())
                        .id(envelope.id.clone())
                        .data(data);
                    return Some((Ok(event), rx));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}
