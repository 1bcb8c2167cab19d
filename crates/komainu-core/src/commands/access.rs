use komainu_db::access;
use komainu_models::interaction::InteractionResponse;
use std::fmt::Write;

use super::{required_id, required_str, subcommand, CommandContext};
use crate::error::CoreError;
use crate::retry::retry_on_conflict;
use crate::AppState;

pub async fn run(
    state: &AppState,
    ctx: &CommandContext<'_>,
) -> Result<InteractionResponse, CoreError> {
    let (name, options) = subcommand(ctx.options)?;
    match name {
        "grant" | "revoke" => {
            let group = required_str(options, "group")?.trim().to_lowercase();
            if !state.commands.is_group(&group) {
                return Err(CoreError::validation(format!(
                    "Sorry, `{group}` is not a valid command group."
                )));
            }
            let role_id = required_id(options, "role")?;
            if name == "grant" {
                grant(state, ctx.guild_id, &group, role_id).await
            } else {
                revoke(state, ctx.guild_id, &group, role_id).await
            }
        }
        "list" => list(state, ctx.guild_id).await,
        other => Err(CoreError::validation(format!("Unknown subcommand `{other}`."))),
    }
}

async fn grant(
    state: &AppState,
    guild_id: i64,
    group: &str,
    role_id: i64,
) -> Result<InteractionResponse, CoreError> {
    let update = retry_on_conflict(&state.config.retry, "access.grant", || {
        access::grant_role(&state.db, guild_id, group, role_id)
    })
    .await?;
    if update.changed {
        tracing::info!(guild_id, group, role_id, "access granted");
    }
    Ok(InteractionResponse::message_no_mention(format!(
        "<@&{role_id}> now has access to the `{group}` command group"
    )))
}

async fn revoke(
    state: &AppState,
    guild_id: i64,
    group: &str,
    role_id: i64,
) -> Result<InteractionResponse, CoreError> {
    let update = retry_on_conflict(&state.config.retry, "access.revoke", || {
        access::revoke_role(&state.db, guild_id, group, role_id)
    })
    .await?;
    if update.changed {
        tracing::info!(guild_id, group, role_id, "access revoked");
    }
    Ok(InteractionResponse::message_no_mention(format!(
        "<@&{role_id}> is denied access to the `{group}` command group"
    )))
}

async fn list(state: &AppState, guild_id: i64) -> Result<InteractionResponse, CoreError> {
    let mut out = String::from("Current access is:\n");
    for group in state.commands.groups() {
        let roles = access::get_roles(&state.db, guild_id, group).await?;
        let _ = write!(out, "`{group}`:");
        match roles {
            Some(roles) if !roles.is_empty() => {
                for role in roles {
                    let _ = write!(out, " <@&{role}>");
                }
            }
            _ => out.push_str(" Administrators only"),
        }
        out.push('\n');
    }
    Ok(InteractionResponse::message_no_mention(out))
}
