use axum::{extract::State, http::StatusCode, Json};
use komainu_core::commands::seen::record_activity;
use komainu_core::{now_epoch, observability, polls, AppState};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;

#[derive(Deserialize)]
pub struct MessageDeleted {
    /// Absent for direct messages, which never carry polls.
    pub guild_id: Option<i64>,
    pub message_id: i64,
}

pub async fn message_deleted(
    State(state): State<AppState>,
    Json(body): Json<MessageDeleted>,
) -> Result<StatusCode, ApiError> {
    if let Some(guild_id) = body.guild_id {
        polls::delete_poll(&state.db, &state.config.retry, guild_id, body.message_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct MessageCreated {
    pub guild_id: Option<i64>,
    pub author_id: i64,
    /// Epoch seconds; defaults to the time of receipt.
    pub timestamp: Option<i64>,
}

pub async fn message_created(
    State(state): State<AppState>,
    Json(body): Json<MessageCreated>,
) -> Result<StatusCode, ApiError> {
    if let Some(guild_id) = body.guild_id {
        let timestamp = body.timestamp.unwrap_or_else(now_epoch);
        record_activity(&state, guild_id, body.author_id, timestamp).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pending_polls": state.pending_polls.len(),
        "metrics": observability::snapshot(),
    }))
}
