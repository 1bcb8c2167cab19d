pub mod error;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use komainu_core::AppState;

const MAX_BODY_BYTES: usize = 256 * 1024;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::events::health))
        .route("/interactions", post(routes::interactions::handle))
        .route(
            "/interactions/{id}/message",
            post(routes::interactions::confirm_message),
        )
        .route(
            "/events/message-delete",
            post(routes::events::message_deleted),
        )
        .route(
            "/events/message-create",
            post(routes::events::message_created),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
