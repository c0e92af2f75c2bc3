//! `/ws` upgrade into the change broadcast.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use tracing::debug;

use stockroom_sync::socket::MAX_MESSAGE_SIZE;
use stockroom_sync::serve_connection;

use crate::AppState;

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    debug!(%addr, "WebSocket upgrade requested");
    let hub = state.hub.clone();
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| serve_connection(socket, hub))
}
