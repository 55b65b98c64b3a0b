//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

use super::engine::EngineError;
use super::events::{ClientEvent, ServerEvent};

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Per-connection loop: register, process events in arrival order, forward
/// queued broadcasts, and release everything on disconnect.
///
/// Event-level failures are reported back as `error {message}` events and
/// never close the connection; only transport errors and close frames end
/// the loop.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ServerEvent>>();
    let connection_id = state.registry.register(tx);
    tracing::debug!(%connection_id, "gateway connection opened");

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_frame(&state, &connection_id, &text, &mut ws_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, ?e, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // A broadcast (or targeted event) queued for this connection.
            outbound = rx.recv() => {
                match outbound {
                    Some(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.engine.disconnect(&connection_id);
    tracing::debug!(%connection_id, "gateway connection closed");
}

/// Parse and dispatch one inbound frame. Returns `false` if the socket
/// writer failed and the loop should end.
async fn handle_frame(
    state: &AppState,
    connection_id: &str,
    text: &str,
    ws_tx: &mut SocketSink,
) -> bool {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(%connection_id, %err, "unparseable client event");
            return send_error(ws_tx, "malformed event").await;
        }
    };

    if let Err(err) = state.engine.dispatch(connection_id, event).await {
        match &err {
            EngineError::Persistence(store_err) => {
                tracing::error!(%connection_id, %store_err, "store operation failed");
            }
            other => {
                tracing::debug!(%connection_id, %other, "event rejected");
            }
        }
        return send_error(ws_tx, &err.to_string()).await;
    }
    true
}

type SocketSink = SplitSink<WebSocket, Message>;

async fn send_event(ws_tx: &mut SocketSink, event: &ServerEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}

async fn send_error(ws_tx: &mut SocketSink, message: &str) -> bool {
    send_event(
        ws_tx,
        &ServerEvent::Error {
            message: message.to_string(),
        },
    )
    .await
    .is_ok()
}
