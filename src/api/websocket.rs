use axum::{
    extract::ws::{WebSocket, WebSocketUpgrade, Message},
    response::Response,
    extract::State,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use crate::oracle::PriceOracle;
use crate::types::Quote;

#[derive(Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    PriceUpdate { quote: Quote },
    /// The client fell behind and `skipped` updates were dropped.
    Lagged { skipped: u64 },
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(oracle): State<Arc<PriceOracle>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, oracle))
}

async fn handle_socket(socket: WebSocket, oracle: Arc<PriceOracle>) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = BroadcastStream::new(oracle.watch());

    // Push every published aggregate to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            let event = match update {
                Ok(quote) => WsEvent::PriceUpdate { quote },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => WsEvent::Lagged { skipped },
            };
            let msg = match serde_json::to_string(&event) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode websocket event");
                    continue;
                }
            };
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Inbound traffic is ignored apart from close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
}
