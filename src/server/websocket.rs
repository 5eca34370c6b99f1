//! WebSocket transport for collaborative editing sessions.
//!
//! This module splits an upgraded axum `WebSocket` into the write half the session
//! manager broadcasts through and the stream of inbound events its worker reads.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt, future};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::session::{CloseReason, Inbound, SessionManager, Transport};

/// Write half of a websocket, shared between the broadcaster and the session worker.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self, reason: CloseReason) {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame {
            code: reason.code,
            reason: reason.reason,
        };
        // The peer may already be gone; there is nobody left to report to.
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
        let _ = sink.close().await;
    }
}

/// Maps raw websocket frames to session events. Ping/pong is answered by axum itself.
fn inbound_events(
    stream: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<Inbound, TransportError>> + Unpin + Send {
    stream.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text))),
            Ok(Message::Binary(data)) => Some(Ok(Inbound::Binary(data))),
            Ok(Message::Close(_)) => Some(Ok(Inbound::Close)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Err(TransportError::Io(e.to_string()))),
        })
    })
}

/// Drives one websocket connection until it closes.
pub async fn handle_websocket_connection(socket: WebSocket, manager: Arc<SessionManager>) {
    info!("New WebSocket connection established");

    let (sink, stream) = socket.split();
    let transport = Arc::new(WebSocketTransport::new(sink));
    manager.serve(transport, inbound_events(stream)).await;

    info!("WebSocket connection ended");
}
