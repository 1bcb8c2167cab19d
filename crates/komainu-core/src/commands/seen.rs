use komainu_db::seen;
use komainu_models::interaction::{find_option, InteractionResponse, ResolvedCommandOption};
use komainu_models::vote::SECONDS_PER_DAY;
use std::fmt::Write;

use super::{required_id, CommandContext};
use crate::error::CoreError;
use crate::retry::retry_on_conflict;
use crate::AppState;

pub const DEFAULT_INACTIVE_DAYS: i64 = 30;
/// Replies past this length are cut and summarised.
const MAX_REPLY_CHARS: usize = 1900;

pub async fn run_seen(
    state: &AppState,
    ctx: &CommandContext<'_>,
) -> Result<InteractionResponse, CoreError> {
    let user_id = required_id(ctx.options, "user")?;
    if state.config.application_user_id == Some(user_id) {
        return Ok(InteractionResponse::message("I'm right here, buddy!"));
    }
    let response = match seen::last_seen(&state.db, ctx.guild_id, user_id).await? {
        None => format!("Sorry, I've never seen <@{user_id}> say anything at all!"),
        Some(timestamp) => format!("I last saw <@{user_id}> <t:{timestamp}:R>"),
    };
    Ok(InteractionResponse::message_no_mention(response))
}

fn inactive_days(options: &[ResolvedCommandOption]) -> Result<i64, CoreError> {
    match find_option(options, "days") {
        None => Ok(DEFAULT_INACTIVE_DAYS),
        Some(opt) => opt
            .as_i64()
            .ok_or_else(|| CoreError::validation("`days` has to be a whole number.")),
    }
}

pub async fn run_inactive(
    state: &AppState,
    ctx: &CommandContext<'_>,
) -> Result<InteractionResponse, CoreError> {
    let days = inactive_days(ctx.options)?;
    if days <= 0 {
        return Ok(InteractionResponse::message(format!(
            "Everyone. Everyone has been inactive for {days} days."
        )));
    }
    let cutoff = ctx.now.saturating_sub(days.saturating_mul(SECONDS_PER_DAY));

    let users = seen::seen_users(&state.db, ctx.guild_id).await?;
    let total = users.len();
    let mut inactive: Vec<(i64, i64)> = users
        .into_iter()
        .filter(|(_, last)| *last <= cutoff)
        .collect();
    inactive.sort_by_key(|(user_id, last)| (*last, *user_id));

    let mut out = String::new();
    let mut listed = 0;
    for (user_id, last) in &inactive {
        let line = format!("<@{user_id}> <t:{last}:R>\n");
        if out.len() + line.len() > MAX_REPLY_CHARS {
            break;
        }
        out.push_str(&line);
        listed += 1;
    }
    if listed < inactive.len() {
        let _ = writeln!(out, "...and {} more.", inactive.len() - listed);
    }
    let _ = write!(
        out,
        "{} inactive in the last {days} days, out of {total} members I've seen.",
        inactive.len()
    );
    Ok(InteractionResponse::message_no_mention(out))
}

/// Note that `user_id` was active at `timestamp`. The bot's own messages are
/// not tracked.
pub async fn record_activity(
    state: &AppState,
    guild_id: i64,
    user_id: i64,
    timestamp: i64,
) -> Result<bool, CoreError> {
    if state.config.application_user_id == Some(user_id) {
        return Ok(false);
    }
    retry_on_conflict(&state.config.retry, "seen.record", || {
        seen::record_seen(&state.db, guild_id, user_id, timestamp)
    })
    .await
}
