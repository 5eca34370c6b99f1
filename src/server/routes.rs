//! Route handlers for the collaborative document server.
//!
//! This module contains the HTTP route handlers and the router that ties them to the
//! shared session manager.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::server::websocket::handle_websocket_connection;
use crate::session::SessionManager;

/// Shared application state
pub type AppState = Arc<SessionManager>;

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub sessions: usize,
    pub document_length: usize,
}

/// Basic health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running!".to_string(),
        sessions: state.session_count(),
        document_length: state.document().len(),
    })
}

/// WebSocket connection handler for collaborative editing
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state))
}

/// Creates and configures the main application router.
///
/// Requests that match no route fall through to `static_dir` when one is given.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
