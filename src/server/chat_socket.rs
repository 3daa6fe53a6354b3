//! WebSocket transport for RouteChat.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::AppState;
use crate::geo::RouteNote;
use crate::service::{ServiceError, StreamError};

pub async fn route_chat(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| chat_socket(socket, state))
}

fn parse_note(bytes: &[u8]) -> Result<RouteNote, StreamError> {
    serde_json::from_slice(bytes).map_err(|e| StreamError::new(format!("malformed note: {e}")))
}

async fn chat_socket(socket: WebSocket, state: AppState) {
    let (mut sink, stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<RouteNote>(state.outbound_buffer);

    // Writer half: runs until the session drops its sender or the peer goes away.
    let writer = tokio::spawn(async move {
        while let Some(note) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&note) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode route note");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream
        .take_while(|msg| futures::future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(parse_note(text.as_str().as_bytes())),
                Ok(Message::Binary(bytes)) => Some(parse_note(&bytes)),
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::new(e.to_string()))),
            }
        });

    let cancel = state.shutdown.child_token();
    match state.service.route_chat(inbound, outbound, cancel).await {
        Ok(()) => tracing::debug!("chat socket closed by client"),
        Err(ServiceError::OutboundClosed) | Err(ServiceError::Cancelled) => {
            tracing::debug!("chat socket torn down")
        }
        Err(e) => tracing::warn!(error = %e, "chat socket ended with error"),
    }

    if let Err(e) = writer.await {
        tracing::error!(error = %e, "chat socket writer panicked");
    }
}
