use komainu_db::records::Mutation;
use komainu_db::{votes, DbPool};
use komainu_models::component::{Component, SelectOption, TextInputStyle};
use komainu_models::interaction::{InteractionCallbackData, InteractionResponse};
use komainu_models::vote::{
    option_key, Vote, MAX_OPTION_LABEL_CHARS, MAX_QUESTION_CHARS, MAX_VOTE_DAYS, MAX_VOTE_OPTIONS,
    MIN_QUESTION_CHARS, SECONDS_PER_DAY,
};
use std::collections::HashMap;

use crate::error::CoreError;
use crate::observability;
use crate::retry::{retry_on_conflict, RetryPolicy};

pub const VOTE_MODAL_ID: &str = "votestart";
pub const VOTE_SELECT_ID: &str = "vote";
pub const QUESTION_INPUT_PREFIX: &str = "desc/";
pub const OPTIONS_INPUT_ID: &str = "options";

pub const CLOSED_MESSAGE: &str = "I'm sorry, that vote is closed!";
pub const INVALID_OPTION_MESSAGE: &str = "Sorry, you can't vote for that.";
pub const NOT_A_POLL_MESSAGE: &str =
    "I'm sorry, but I can't find the poll you are trying to vote on?!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Open,
    Closed,
}

/// Open/closed is derived from the clock on every read; nothing is stored.
pub fn state(vote: &Vote, now: i64) -> PollState {
    if vote.is_open(now) {
        PollState::Open
    } else {
        PollState::Closed
    }
}

pub fn validate_duration(days: f64) -> Result<f64, CoreError> {
    if !days.is_finite() || days <= 0.0 || days > MAX_VOTE_DAYS {
        return Err(CoreError::validation(format!(
            "A vote has to run for more than 0 and at most {MAX_VOTE_DAYS} days."
        )));
    }
    Ok(days)
}

/// The modal that collects a poll's question and options. The duration rides
/// along in the question input's custom id.
pub fn creation_form(days: f64) -> Result<InteractionResponse, CoreError> {
    let days = validate_duration(days)?;
    let question = Component::text_input(
        &format!("{QUESTION_INPUT_PREFIX}{days}"),
        "Description of the vote",
        TextInputStyle::Paragraph,
    )
    .length_limits(MIN_QUESTION_CHARS as u32, MAX_QUESTION_CHARS as u32)
    .with_placeholder("Describe what everyone is supposed to be voting about.");
    let options = Component::text_input(
        OPTIONS_INPUT_ID,
        "Options, 1/line, max 25, max 100 chars/line",
        TextInputStyle::Paragraph,
    )
    .with_value("Yes\nNo");

    Ok(InteractionResponse::modal(
        VOTE_MODAL_ID,
        "Call a vote!",
        vec![question, options],
    ))
}

/// Parse the duration back out of a question input id (`desc/<days>`).
pub fn duration_from_input_id(custom_id: &str) -> Result<f64, CoreError> {
    let raw = custom_id
        .strip_prefix(QUESTION_INPUT_PREFIX)
        .ok_or_else(|| CoreError::validation("That vote form is missing its question."))?;
    let days: f64 = raw
        .parse()
        .map_err(|_| CoreError::validation("That vote form has an unreadable length."))?;
    validate_duration(days)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A fully formed poll that has not been written anywhere yet. It becomes
/// visible to voters only through [`PollDraft::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    vote: Vote,
}

impl PollDraft {
    /// Blank lines are dropped, then only the first 25 remaining lines are
    /// kept. Labels longer than 100 characters are truncated.
    pub fn new(
        guild_id: i64,
        now: i64,
        days: f64,
        question: &str,
        option_lines: &str,
    ) -> Result<Self, CoreError> {
        let days = validate_duration(days)?;

        let question = question.trim();
        let question_len = question.chars().count();
        if question_len < MIN_QUESTION_CHARS || question_len > MAX_QUESTION_CHARS {
            return Err(CoreError::validation(format!(
                "The vote description must be between {MIN_QUESTION_CHARS} and {MAX_QUESTION_CHARS} characters."
            )));
        }

        let mut options = HashMap::new();
        let mut order = Vec::new();
        let labels = option_lines
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(MAX_VOTE_OPTIONS);
        for (position, label) in labels.enumerate() {
            let key = option_key(position);
            options.insert(key.clone(), truncate_chars(label, MAX_OPTION_LABEL_CHARS));
            order.push(key);
        }
        if order.is_empty() {
            return Err(CoreError::validation("A vote needs at least one option."));
        }

        let duration = (days * SECONDS_PER_DAY as f64) as i64;
        Ok(Self {
            vote: Vote {
                start_time: now,
                end_time: now.saturating_add(duration),
                guild_id,
                channel_id: None,
                message_id: None,
                question: question.to_string(),
                options,
                order,
                votes: HashMap::new(),
            },
        })
    }

    pub fn vote(&self) -> &Vote {
        &self.vote
    }

    pub fn guild_id(&self) -> i64 {
        self.vote.guild_id
    }

    /// The message the platform should post for this poll.
    pub fn message(&self, now: i64) -> InteractionCallbackData {
        poll_message(&self.vote, now)
    }

    /// Second phase of creation: the platform has confirmed the message, so
    /// the poll is written for the first and only time.
    pub async fn confirm(
        self,
        pool: &DbPool,
        policy: &RetryPolicy,
        channel_id: i64,
        message_id: i64,
    ) -> Result<Vote, CoreError> {
        let mut vote = self.vote;
        vote.channel_id = Some(channel_id);
        vote.message_id = Some(message_id);

        let guild_id = vote.guild_id;
        let stored = &vote;
        retry_on_conflict(policy, "poll.confirm", || {
            votes::store_vote(pool, guild_id, message_id, stored)
        })
        .await?;
        tracing::info!(guild_id, message_id, options = vote.order.len(), "poll opened");
        Ok(vote)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotOutcome {
    /// No poll is stored for the message; a normal outcome for unrelated components.
    NotAPoll,
    /// The poll has ended. Nothing was written.
    Closed(Vote),
    Recorded { label: String, vote: Vote },
}

fn apply_ballot(
    current: Option<Vote>,
    voter_id: i64,
    choice: &str,
    now: i64,
) -> (Mutation<Vote>, Result<BallotOutcome, CoreError>) {
    let Some(mut vote) = current else {
        return (Mutation::Keep, Ok(BallotOutcome::NotAPoll));
    };
    if !vote.is_open(now) {
        return (Mutation::Keep, Ok(BallotOutcome::Closed(vote)));
    }
    let Some(label) = vote.label(choice).map(str::to_string) else {
        return (
            Mutation::Keep,
            Err(CoreError::validation(INVALID_OPTION_MESSAGE)),
        );
    };

    if vote.votes.get(&voter_id).map(String::as_str) == Some(choice) {
        return (Mutation::Keep, Ok(BallotOutcome::Recorded { label, vote }));
    }
    vote.votes.insert(voter_id, choice.to_string());
    (
        Mutation::Put(vote.clone()),
        Ok(BallotOutcome::Recorded { label, vote }),
    )
}

/// Record `voter_id`'s choice on the poll rendered by `message_id`. A voter
/// holds at most one ballot; a new choice replaces the previous one.
pub async fn cast_ballot(
    pool: &DbPool,
    policy: &RetryPolicy,
    guild_id: i64,
    message_id: i64,
    voter_id: i64,
    choice: &str,
    now: i64,
) -> Result<BallotOutcome, CoreError> {
    let outcome = retry_on_conflict(policy, "poll.cast_ballot", || {
        votes::update_vote(pool, guild_id, message_id, |current| {
            apply_ballot(current, voter_id, choice, now)
        })
    })
    .await?;

    match &outcome {
        Ok(BallotOutcome::Recorded { .. }) => {
            observability::ballot_recorded();
            tracing::debug!(guild_id, message_id, voter_id, "ballot recorded");
        }
        Ok(BallotOutcome::Closed(_)) | Err(_) => observability::ballot_rejected(),
        Ok(BallotOutcome::NotAPoll) => {}
    }
    outcome
}

pub async fn load_poll(
    pool: &DbPool,
    guild_id: i64,
    message_id: i64,
) -> Result<Option<Vote>, CoreError> {
    Ok(votes::get_vote(pool, guild_id, message_id).await?)
}

/// Forget the poll rendered by a deleted message. Idempotent.
pub async fn delete_poll(
    pool: &DbPool,
    policy: &RetryPolicy,
    guild_id: i64,
    message_id: i64,
) -> Result<bool, CoreError> {
    let removed = retry_on_conflict(policy, "poll.delete", || {
        votes::delete_vote(pool, guild_id, message_id)
    })
    .await?;
    if removed {
        tracing::info!(guild_id, message_id, "poll deleted with its message");
    }
    Ok(removed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyRow {
    pub key: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub rows: Vec<TallyRow>,
    pub total: usize,
}

/// Count ballots per option, in presentation order.
pub fn tally(vote: &Vote) -> Tally {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for choice in vote.votes.values() {
        *counts.entry(choice.as_str()).or_insert(0) += 1;
    }
    let rows: Vec<TallyRow> = vote
        .ordered_options()
        .map(|(key, label)| TallyRow {
            key: key.to_string(),
            label: label.to_string(),
            count: counts.get(key).copied().unwrap_or(0),
        })
        .collect();
    let total = rows.iter().map(|row| row.count).sum();
    Tally { rows, total }
}

fn format_remaining(seconds: i64) -> String {
    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / 3600;
    let minutes = (seconds % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{}m", minutes.max(1))
    }
}

pub fn render_tally(vote: &Vote, now: i64) -> String {
    let tally = tally(vote);
    let mut out = format!("**{}**\n", vote.question);
    for (idx, row) in tally.rows.iter().enumerate() {
        out.push_str(&format!("{}. {}: {}\n", idx + 1, row.label, row.count));
    }
    out.push_str(&format!("Total votes: {}\n", tally.total));
    match state(vote, now) {
        PollState::Open => out.push_str(&format!(
            "Closes in {} (<t:{}:R>)",
            format_remaining(vote.end_time - now),
            vote.end_time
        )),
        PollState::Closed => out.push_str("Voting is closed."),
    }
    out
}

/// Message body for a poll: the tally plus the ballot selector, in `order`.
pub fn poll_message(vote: &Vote, now: i64) -> InteractionCallbackData {
    let choices = vote
        .ordered_options()
        .map(|(key, label)| SelectOption {
            label: label.to_string(),
            value: key.to_string(),
            description: None,
            default: false,
        })
        .collect();
    InteractionCallbackData {
        content: Some(render_tally(vote, now)),
        components: vec![Component::action_row(vec![Component::string_select(
            VOTE_SELECT_ID,
            "Cast your vote!",
            choices,
        )])],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;
    const GUILD: i64 = 10;
    const MESSAGE: i64 = 500;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 50,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        }
    }

    async fn open_poll(pool: &DbPool, question: &str, options: &str) -> Vote {
        PollDraft::new(GUILD, NOW, 1.0, question, options)
            .expect("draft")
            .confirm(pool, &policy(), 77, MESSAGE)
            .await
            .expect("confirm")
    }

    async fn ballot(pool: &DbPool, voter: i64, choice: &str, now: i64) -> BallotOutcome {
        cast_ballot(pool, &policy(), GUILD, MESSAGE, voter, choice, now)
            .await
            .expect("ballot")
    }

    #[test]
    fn durations_outside_range_are_rejected() {
        assert!(validate_duration(0.0).is_err());
        assert!(validate_duration(-1.0).is_err());
        assert!(validate_duration(365.5).is_err());
        assert!(validate_duration(f64::NAN).is_err());
        assert_eq!(validate_duration(365.0).expect("max"), 365.0);
        assert_eq!(validate_duration(0.5).expect("half"), 0.5);
    }

    #[test]
    fn creation_form_carries_duration() {
        let form = creation_form(2.5).expect("form");
        let data = form.data.expect("data");
        assert_eq!(data.custom_id.as_deref(), Some(VOTE_MODAL_ID));
        let question = &data.components[0].components[0];
        let id = question.custom_id.as_deref().expect("id");
        assert_eq!(duration_from_input_id(id).expect("days"), 2.5);
        assert_eq!(data.components[1].components[0].value.as_deref(), Some("Yes\nNo"));
    }

    #[test]
    fn draft_applies_option_limits() {
        let lines: Vec<String> = (0..30).map(|i| format!("choice {i}")).collect();
        let mut text = String::from("\n  \n");
        text.push_str(&lines.join("\n"));
        let draft = PollDraft::new(GUILD, NOW, 1.0, "Pick", &text).expect("draft");
        let vote = draft.vote();
        assert_eq!(vote.order.len(), MAX_VOTE_OPTIONS);
        assert_eq!(vote.order[0], "opt/0");
        assert_eq!(vote.label("opt/0"), Some("choice 0"));
        assert_eq!(vote.label("opt/24"), Some("choice 24"));
        assert_eq!(vote.end_time, NOW + SECONDS_PER_DAY);
    }

    #[test]
    fn long_labels_are_truncated_on_char_boundaries() {
        let label = "é".repeat(150);
        let draft = PollDraft::new(GUILD, NOW, 1.0, "Pick", &label).expect("draft");
        let stored = draft.vote().label("opt/0").expect("label");
        assert_eq!(stored.chars().count(), MAX_OPTION_LABEL_CHARS);
    }

    #[test]
    fn question_and_options_are_required() {
        assert!(PollDraft::new(GUILD, NOW, 1.0, "   ", "Yes").is_err());
        assert!(PollDraft::new(GUILD, NOW, 1.0, &"q".repeat(501), "Yes").is_err());
        assert!(PollDraft::new(GUILD, NOW, 1.0, "Pick", "\n \n").is_err());
    }

    #[tokio::test]
    async fn draft_is_not_stored_until_confirmed() {
        let pool = test_pool(1).await;
        let draft = PollDraft::new(GUILD, NOW, 1.0, "Lunch?", "Pizza\nTacos").expect("draft");
        let _ = draft.message(NOW);
        assert!(load_poll(&pool, GUILD, MESSAGE).await.expect("load").is_none());

        let vote = draft.confirm(&pool, &policy(), 77, MESSAGE).await.expect("confirm");
        assert_eq!(vote.message_id, Some(MESSAGE));
        assert_eq!(vote.channel_id, Some(77));
        let stored = load_poll(&pool, GUILD, MESSAGE).await.expect("load");
        assert_eq!(stored, Some(vote));
    }

    #[tokio::test]
    async fn distinct_voters_are_all_counted() {
        let pool = test_pool(1).await;
        open_poll(&pool, "Pick", "A\nB\nC").await;
        for voter in 0..9_i64 {
            let choice = option_key((voter % 3) as usize);
            ballot(&pool, voter, &choice, NOW + 10).await;
        }
        let vote = load_poll(&pool, GUILD, MESSAGE).await.expect("load").expect("poll");
        let tally = tally(&vote);
        assert_eq!(tally.total, 9);
        assert_eq!(tally.rows.iter().map(|row| row.count).sum::<usize>(), 9);
        assert!(tally.rows.iter().all(|row| row.count == 3));
    }

    #[tokio::test]
    async fn revote_replaces_previous_choice() {
        let pool = test_pool(1).await;
        open_poll(&pool, "Pick", "A\nB").await;
        ballot(&pool, 1, "opt/0", NOW + 1).await;
        let outcome = ballot(&pool, 1, "opt/1", NOW + 2).await;
        let BallotOutcome::Recorded { label, vote } = outcome else {
            panic!("expected a recorded ballot");
        };
        assert_eq!(label, "B");
        let tally = tally(&vote);
        assert_eq!(tally.total, 1);
        assert_eq!(tally.rows[0].count, 0);
        assert_eq!(tally.rows[1].count, 1);
    }

    #[tokio::test]
    async fn closed_poll_rejects_without_writing() {
        let pool = test_pool(1).await;
        let vote = open_poll(&pool, "Pick", "A\nB").await;
        ballot(&pool, 1, "opt/0", NOW + 1).await;
        let before = load_poll(&pool, GUILD, MESSAGE).await.expect("load");

        let outcome = ballot(&pool, 2, "opt/1", vote.end_time).await;
        assert!(matches!(outcome, BallotOutcome::Closed(_)));
        let after = load_poll(&pool, GUILD, MESSAGE).await.expect("load");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unknown_option_is_a_validation_error() {
        let pool = test_pool(1).await;
        open_poll(&pool, "Pick", "A\nB").await;
        let before = load_poll(&pool, GUILD, MESSAGE).await.expect("load");
        let err = cast_ballot(&pool, &policy(), GUILD, MESSAGE, 1, "opt/9", NOW + 1)
            .await
            .expect_err("must reject");
        assert!(matches!(err, CoreError::Validation(ref msg) if msg == INVALID_OPTION_MESSAGE));
        let after = load_poll(&pool, GUILD, MESSAGE).await.expect("load");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn lunch_poll_scenario() {
        let pool = test_pool(1).await;
        let vote = open_poll(&pool, "Lunch?", "Pizza\nTacos").await;
        ballot(&pool, 1, "opt/0", NOW + 60).await;
        ballot(&pool, 2, "opt/1", NOW + 120).await;

        let stored = load_poll(&pool, GUILD, MESSAGE).await.expect("load").expect("poll");
        let rendered = render_tally(&stored, NOW + 120);
        assert!(rendered.contains("1. Pizza: 1"));
        assert!(rendered.contains("2. Tacos: 1"));
        assert!(rendered.contains("Total votes: 2"));

        let late = ballot(&pool, 3, "opt/0", vote.end_time + 1).await;
        assert!(matches!(late, BallotOutcome::Closed(_)));
        let stored = load_poll(&pool, GUILD, MESSAGE).await.expect("load").expect("poll");
        let after = tally(&stored);
        assert_eq!(after.total, 2);
        assert_eq!(after.rows[0].count, 1);
        assert_eq!(after.rows[1].count, 1);
        assert!(render_tally(&stored, vote.end_time + 1).ends_with("Voting is closed."));
    }

    #[tokio::test]
    async fn ballot_after_delete_is_not_a_poll() {
        let pool = test_pool(1).await;
        open_poll(&pool, "Pick", "A").await;
        assert!(delete_poll(&pool, &policy(), GUILD, MESSAGE).await.expect("delete"));
        assert!(!delete_poll(&pool, &policy(), GUILD, MESSAGE).await.expect("again"));
        assert_eq!(ballot(&pool, 1, "opt/0", NOW + 1).await, BallotOutcome::NotAPoll);
        assert!(load_poll(&pool, GUILD, MESSAGE).await.expect("load").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ballots_are_not_lost() {
        let pool = test_pool(4).await;
        open_poll(&pool, "Pick", "A\nB").await;

        let mut handles = Vec::new();
        for voter in 0..16_i64 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let choice = option_key((voter % 2) as usize);
                cast_ballot(&pool, &policy(), GUILD, MESSAGE, voter, &choice, NOW + 5).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("ballot");
        }

        let vote = load_poll(&pool, GUILD, MESSAGE).await.expect("load").expect("poll");
        assert_eq!(vote.votes.len(), 16);
        let tally = tally(&vote);
        assert_eq!(tally.total, 16);
        assert_eq!(tally.rows[0].count, 8);
        assert_eq!(tally.rows[1].count, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simultaneous_ballots_succeed_with_default_policy() {
        let pool = test_pool(8).await;
        open_poll(&pool, "Pick", "A\nB\nC").await;
        let policy = RetryPolicy::default();

        let mut handles = Vec::new();
        for voter in 0..64_i64 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let choice = option_key((voter % 3) as usize);
                cast_ballot(&pool, &policy, GUILD, MESSAGE, voter, &choice, NOW + 5).await
            }));
        }
        let mut failed = 0;
        for handle in handles {
            if handle.await.expect("join").is_err() {
                failed += 1;
            }
        }

        assert_eq!(failed, 0);
        let vote = load_poll(&pool, GUILD, MESSAGE).await.expect("load").expect("poll");
        assert_eq!(vote.votes.len(), 64);
        assert_eq!(tally(&vote).total, 64);
    }

    #[test]
    fn render_is_deterministic_and_ordered() {
        let draft = PollDraft::new(GUILD, NOW, 2.0, "Order?", "Zulu\nAlpha\nMike").expect("draft");
        let first = render_tally(draft.vote(), NOW + 3600);
        let second = render_tally(&draft.vote().clone(), NOW + 3600);
        assert_eq!(first, second);
        let zulu = first.find("Zulu").expect("zulu");
        let alpha = first.find("Alpha").expect("alpha");
        let mike = first.find("Mike").expect("mike");
        assert!(zulu < alpha && alpha < mike);
        assert!(first.contains("Closes in 1d 23h 0m"));
    }

    #[test]
    fn poll_message_selector_follows_order() {
        let draft = PollDraft::new(GUILD, NOW, 1.0, "Order?", "Zulu\nAlpha").expect("draft");
        let data = draft.message(NOW);
        let select = &data.components[0].components[0];
        assert_eq!(select.custom_id.as_deref(), Some(VOTE_SELECT_ID));
        let values: Vec<&str> = select.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["opt/0", "opt/1"]);
    }
}
