//! Web server module for the collaborative document service.
//!
//! This module contains the Axum router and the adapter that turns an upgraded
//! websocket into a session transport.

pub mod routes;
pub mod websocket;

pub use routes::{AppState, HealthResponse, create_router};
pub use websocket::{WebSocketTransport, handle_websocket_connection};
