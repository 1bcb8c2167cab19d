use komainu_models::component::{modal_values, Component};
use komainu_models::interaction::{find_option, InteractionCallbackType, InteractionResponse};

use super::CommandContext;
use crate::error::CoreError;
use crate::polls::{
    self, BallotOutcome, PollDraft, CLOSED_MESSAGE, NOT_A_POLL_MESSAGE, OPTIONS_INPUT_ID,
    QUESTION_INPUT_PREFIX,
};
use crate::AppState;

/// `/vote length`: answer with the form that collects question and options.
pub fn run_command(ctx: &CommandContext<'_>) -> Result<InteractionResponse, CoreError> {
    let days = find_option(ctx.options, "length")
        .and_then(|opt| opt.as_f64())
        .ok_or_else(|| CoreError::validation("Wait, how many days? Try again."))?;
    polls::creation_form(days)
}

/// Turn a submitted creation form into a draft. Nothing is stored yet.
pub fn run_form(guild_id: i64, components: &[Component], now: i64) -> Result<PollDraft, CoreError> {
    let mut question: Option<(f64, String)> = None;
    let mut options: Option<String> = None;

    for (id, value) in modal_values(components) {
        if id.starts_with(QUESTION_INPUT_PREFIX) {
            if question.is_some() {
                return Err(CoreError::validation(
                    "That vote form had two questions in it.",
                ));
            }
            question = Some((polls::duration_from_input_id(&id)?, value));
        } else if id == OPTIONS_INPUT_ID {
            options = Some(value);
        } else {
            tracing::warn!(guild_id, input = %id, "unexpected input in vote form");
            return Err(CoreError::validation(
                "Something strange was in that vote form.",
            ));
        }
    }

    let Some((days, question)) = question else {
        return Err(CoreError::validation("That vote form is missing its question."));
    };
    PollDraft::new(
        guild_id,
        now,
        days,
        &question,
        options.as_deref().unwrap_or_default(),
    )
}

/// A selection on a poll's menu: cast the ballot and redraw the poll.
pub async fn run_ballot(
    state: &AppState,
    guild_id: i64,
    message_id: i64,
    voter_id: i64,
    values: &[String],
    now: i64,
) -> Result<InteractionResponse, CoreError> {
    let [choice] = values else {
        return Err(CoreError::validation("You must select exactly one item"));
    };
    let outcome = polls::cast_ballot(
        &state.db,
        &state.config.retry,
        guild_id,
        message_id,
        voter_id,
        choice,
        now,
    )
    .await?;

    Ok(match outcome {
        BallotOutcome::Recorded { vote, .. } => InteractionResponse::with_data(
            InteractionCallbackType::UpdateMessage,
            polls::poll_message(&vote, now),
        ),
        BallotOutcome::Closed(_) => InteractionResponse::ephemeral(CLOSED_MESSAGE),
        BallotOutcome::NotAPoll => {
            tracing::debug!(guild_id, message_id, "selection on a message without a poll");
            InteractionResponse::ephemeral(NOT_A_POLL_MESSAGE)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::*;
    use crate::commands::{handle_interaction, Dispatched};
    use crate::polls::{VOTE_MODAL_ID, VOTE_SELECT_ID};
    use crate::test_support::test_state;
    use komainu_models::command::CommandOptionType;
    use komainu_models::component::TextInputStyle;
    use komainu_models::interaction::{
        Interaction, InteractionData, InteractionType, MessageRef,
    };
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;
    const MESSAGE: i64 = 4_000;

    fn form_rows(days: &str, question: &str, options: &str) -> Vec<Component> {
        vec![
            Component::action_row(vec![Component::text_input(
                &format!("desc/{days}"),
                "Question",
                TextInputStyle::Paragraph,
            )
            .with_value(question)]),
            Component::action_row(vec![Component::text_input(
                "options",
                "Options",
                TextInputStyle::Paragraph,
            )
            .with_value(options)]),
        ]
    }

    fn modal(components: Vec<Component>) -> Interaction {
        let mut interaction = command("vote", admin(), Vec::new());
        interaction.id = 31;
        interaction.interaction_type = InteractionType::ModalSubmit;
        interaction.data = Some(InteractionData {
            custom_id: Some(VOTE_MODAL_ID.to_string()),
            components,
            ..data()
        });
        interaction
    }

    fn select(voter: i64, values: Vec<&str>) -> Interaction {
        let mut interaction = command("vote", regular(voter, Vec::new()), Vec::new());
        interaction.interaction_type = InteractionType::MessageComponent;
        interaction.data = Some(InteractionData {
            custom_id: Some(VOTE_SELECT_ID.to_string()),
            component_type: Some(3),
            values: values.into_iter().map(str::to_string).collect(),
            ..data()
        });
        interaction.message = Some(MessageRef {
            id: MESSAGE,
            channel_id: 7,
        });
        interaction
    }

    #[tokio::test]
    async fn vote_command_answers_with_form() {
        let state = test_state().await;
        let request = command(
            "vote",
            admin(),
            vec![option("length", CommandOptionType::Number, json!(1.5))],
        );
        let Dispatched { response, pending } = handle_interaction(&state, &request, NOW).await;
        assert_eq!(response.response_type, InteractionCallbackType::Modal);
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn out_of_range_length_is_rejected() {
        let state = test_state().await;
        let request = command(
            "vote",
            admin(),
            vec![option("length", CommandOptionType::Number, json!(400))],
        );
        let dispatched = handle_interaction(&state, &request, NOW).await;
        assert!(dispatched.response.is_ephemeral());
    }

    #[tokio::test]
    async fn full_vote_flow_through_dispatch() {
        let state = test_state().await;
        let submitted = modal(form_rows("1", "Lunch?", "Pizza\nTacos"));
        let Dispatched { response, pending } = handle_interaction(&state, &submitted, NOW).await;
        assert_eq!(response.response_type, InteractionCallbackType::ChannelMessageWithSource);
        assert!(response.content().unwrap_or_default().contains("Lunch?"));
        let draft = pending.expect("draft");
        assert!(polls::load_poll(&state.db, GUILD, MESSAGE).await.expect("load").is_none());

        draft
            .confirm(&state.db, &state.config.retry, 7, MESSAGE)
            .await
            .expect("confirm");

        let first = handle_interaction(&state, &select(1, vec!["opt/0"]), NOW + 5).await;
        assert_eq!(first.response.response_type, InteractionCallbackType::UpdateMessage);
        let second = handle_interaction(&state, &select(2, vec!["opt/1"]), NOW + 6).await;
        let text = second.response.content().expect("tally");
        assert!(text.contains("1. Pizza: 1"));
        assert!(text.contains("2. Tacos: 1"));

        let late = handle_interaction(&state, &select(3, vec!["opt/0"]), NOW + 86_400).await;
        assert_eq!(late.response.content(), Some(CLOSED_MESSAGE));
    }

    #[tokio::test]
    async fn selection_must_be_single() {
        let state = test_state().await;
        let dispatched = handle_interaction(&state, &select(1, Vec::new()), NOW).await;
        assert_eq!(dispatched.response.content(), Some("You must select exactly one item"));
    }

    #[tokio::test]
    async fn selection_on_unknown_message_is_not_a_poll() {
        let state = test_state().await;
        let dispatched = handle_interaction(&state, &select(1, vec!["opt/0"]), NOW).await;
        assert_eq!(dispatched.response.content(), Some(NOT_A_POLL_MESSAGE));
    }

    #[test]
    fn form_with_unknown_input_is_rejected() {
        let mut rows = form_rows("1", "Q", "A");
        rows.push(Component::action_row(vec![Component::text_input(
            "surprise",
            "Huh",
            TextInputStyle::Short,
        )
        .with_value("x")]));
        assert!(matches!(run_form(GUILD, &rows, NOW), Err(CoreError::Validation(_))));
    }

    #[test]
    fn form_without_question_is_rejected() {
        let rows = vec![Component::action_row(vec![Component::text_input(
            "options",
            "Options",
            TextInputStyle::Paragraph,
        )
        .with_value("A")])];
        assert!(run_form(GUILD, &rows, NOW).is_err());
    }
}
