use axum::{
    extract::{Path, State},
    Json,
};
use komainu_core::commands::{handle_interaction, Dispatched};
use komainu_core::{now_epoch, AppState};
use komainu_models::interaction::{Interaction, InteractionResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;

pub async fn handle(
    State(state): State<AppState>,
    Json(interaction): Json<Interaction>,
) -> Json<InteractionResponse> {
    let Dispatched { response, pending } =
        handle_interaction(&state, &interaction, now_epoch()).await;
    if let Some(draft) = pending {
        tracing::debug!(
            interaction_id = interaction.id,
            guild_id = draft.guild_id(),
            "poll draft waiting for its message"
        );
        state.pending_polls.insert(interaction.id, draft);
    }
    Json(response)
}

#[derive(Deserialize)]
pub struct ConfirmMessage {
    pub channel_id: i64,
    pub message_id: i64,
}

/// The platform posted the message answering interaction `id`; open the poll
/// drafted for it.
pub async fn confirm_message(
    State(state): State<AppState>,
    Path(interaction_id): Path<i64>,
    Json(body): Json<ConfirmMessage>,
) -> Result<Json<Value>, ApiError> {
    let draft = state
        .pending_polls
        .take(interaction_id, state.config.pending_poll_ttl)
        .ok_or(ApiError::NotFound)?;
    let vote = draft
        .confirm(
            &state.db,
            &state.config.retry,
            body.channel_id,
            body.message_id,
        )
        .await?;

    Ok(Json(json!({
        "guild_id": vote.guild_id,
        "channel_id": body.channel_id,
        "message_id": body.message_id,
        "end_time": vote.end_time,
    })))
}
