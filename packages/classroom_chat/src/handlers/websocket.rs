use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chat_protocol::Identity;
use tracing::warn;

use crate::AppState;
use crate::router;

/// Upgrade `/ws/chat/{user_id}` into a chat channel for `user_id`.
pub async fn chat_websocket_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match Identity::new(user_id) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Rejected chat channel with invalid identity");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let registry = state.registry.clone();
    let metrics = state.metrics.clone();
    let server_config = state.server_config.clone();

    ws.on_upgrade(move |socket| {
        router::handle_channel(socket, identity, registry, metrics, server_config)
    })
}
