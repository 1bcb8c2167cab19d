use komainu_db::faq;
use komainu_models::interaction::InteractionResponse;

use super::{required_str, subcommand, CommandContext};
use crate::error::CoreError;
use crate::retry::retry_on_conflict;
use crate::AppState;

pub const MAX_FAQ_CONTENT_CHARS: usize = 2000;
pub const MAX_FAQ_TOPIC_CHARS: usize = 100;

fn checked_topic(raw: &str) -> Result<String, CoreError> {
    let topic = faq::normalize_topic(raw);
    if topic.is_empty() || topic.chars().count() > MAX_FAQ_TOPIC_CHARS {
        return Err(CoreError::validation(format!(
            "FAQ topics must be between 1 and {MAX_FAQ_TOPIC_CHARS} characters."
        )));
    }
    Ok(topic)
}

pub async fn run_faq(
    state: &AppState,
    ctx: &CommandContext<'_>,
) -> Result<InteractionResponse, CoreError> {
    let topic = checked_topic(required_str(ctx.options, "topic")?)?;
    match faq::get_entry(&state.db, ctx.guild_id, &topic).await? {
        Some(content) => Ok(InteractionResponse::message_no_mention(content)),
        None => Ok(InteractionResponse::ephemeral(format!(
            "I don't know anything about `{topic}`."
        ))),
    }
}

pub async fn run_faqset(
    state: &AppState,
    ctx: &CommandContext<'_>,
) -> Result<InteractionResponse, CoreError> {
    let (name, options) = subcommand(ctx.options)?;
    match name {
        "add" => {
            let topic = checked_topic(required_str(options, "topic")?)?;
            let content = required_str(options, "content")?.trim();
            if content.is_empty() || content.chars().count() > MAX_FAQ_CONTENT_CHARS {
                return Err(CoreError::validation(format!(
                    "FAQ content must be between 1 and {MAX_FAQ_CONTENT_CHARS} characters."
                )));
            }
            retry_on_conflict(&state.config.retry, "faq.set", || {
                faq::set_entry(&state.db, ctx.guild_id, &topic, content)
            })
            .await?;
            tracing::info!(guild_id = ctx.guild_id, topic = %topic, "faq topic saved");
            Ok(InteractionResponse::message_no_mention(format!(
                "FAQ topic `{topic}` saved."
            )))
        }
        "remove" => {
            let topic = checked_topic(required_str(options, "topic")?)?;
            let removed = retry_on_conflict(&state.config.retry, "faq.remove", || {
                faq::remove_entry(&state.db, ctx.guild_id, &topic)
            })
            .await?;
            let reply = if removed {
                format!("FAQ topic `{topic}` removed.")
            } else {
                format!("There was no FAQ topic `{topic}`.")
            };
            Ok(InteractionResponse::message_no_mention(reply))
        }
        "list" => {
            let topics = faq::list_topics(&state.db, ctx.guild_id).await?;
            if topics.is_empty() {
                return Ok(InteractionResponse::message("The FAQ is empty."));
            }
            let listed: Vec<String> = topics.iter().map(|topic| format!("`{topic}`")).collect();
            Ok(InteractionResponse::message_no_mention(format!(
                "Known topics: {}",
                listed.join(", ")
            )))
        }
        other => Err(CoreError::validation(format!("Unknown subcommand `{other}`."))),
    }
}
