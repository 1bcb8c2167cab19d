pub mod access;
pub mod faq;
pub mod seen;
pub mod vote;

use komainu_models::command::{CommandDefinition, CommandOption, CommandOptionType};
use komainu_models::interaction::{
    find_option, Interaction, InteractionCallbackType, InteractionMember, InteractionResponse,
    InteractionType, ResolvedCommandOption,
};
use komainu_models::vote::MAX_VOTE_DAYS;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CoreError;
use crate::polls::{PollDraft, NOT_A_POLL_MESSAGE, VOTE_MODAL_ID, VOTE_SELECT_ID};
use crate::{observability, permissions, AppState, GENERIC_FAILURE};

pub const ACCESS_DENIED: &str = "Sorry, access was denied.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Access,
    Seen,
    Inactive,
    Faq,
    FaqSet,
    Vote,
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub kind: CommandKind,
    /// Access is granted per group, not per command.
    pub group: String,
    pub definition: CommandDefinition,
}

/// Command name to handler mapping, fixed once built.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandEntry>,
    groups: BTreeSet<String>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    pub fn definitions(&self) -> Vec<CommandDefinition> {
        self.commands
            .values()
            .map(|entry| entry.definition.clone())
            .collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(String::as_str)
    }

    pub fn is_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistryBuilder {
    entries: Vec<CommandEntry>,
}

impl CommandRegistryBuilder {
    pub fn command(mut self, kind: CommandKind, group: &str, definition: CommandDefinition) -> Self {
        self.entries.push(CommandEntry {
            kind,
            group: group.to_string(),
            definition,
        });
        self
    }

    pub fn build(self) -> Result<CommandRegistry, CoreError> {
        let mut registry = CommandRegistry::default();
        for entry in self.entries {
            let name = entry.definition.name.clone();
            if name.is_empty() || entry.group.is_empty() {
                return Err(CoreError::Internal(
                    "commands need a name and a group".to_string(),
                ));
            }
            registry.groups.insert(entry.group.clone());
            if registry.commands.insert(name.clone(), entry).is_some() {
                return Err(CoreError::Internal(format!(
                    "command /{name} registered twice"
                )));
            }
        }
        Ok(registry)
    }
}

fn definition(name: &str, description: &str, options: Vec<CommandOption>) -> CommandDefinition {
    CommandDefinition {
        name: name.to_string(),
        description: description.to_string(),
        options,
    }
}

fn group_and_role(action: &str) -> Vec<CommandOption> {
    vec![
        CommandOption::new(
            CommandOptionType::String,
            "group",
            &format!("The command group to {action}"),
        )
        .required(),
        CommandOption::new(CommandOptionType::Role, "role", "The role this applies to").required(),
    ]
}

/// Every command this bot answers, with its access group.
pub fn default_registry() -> Result<CommandRegistry, CoreError> {
    CommandRegistry::builder()
        .command(
            CommandKind::Access,
            "access",
            definition(
                "access",
                "Grant, revoke and list command group access",
                vec![
                    CommandOption::subcommand(
                        "grant",
                        "Grant a role access to something",
                        group_and_role("grant access to"),
                    ),
                    CommandOption::subcommand(
                        "revoke",
                        "Revoke access to something from a role",
                        group_and_role("revoke access from"),
                    ),
                    CommandOption::subcommand(
                        "list",
                        "List what roles have access to what command groups",
                        Vec::new(),
                    ),
                ],
            ),
        )
        .command(
            CommandKind::Seen,
            "seen",
            definition(
                "seen",
                "Check when someone was last around",
                vec![
                    CommandOption::new(CommandOptionType::User, "user", "The user to look up")
                        .required(),
                ],
            ),
        )
        .command(
            CommandKind::Inactive,
            "seen",
            definition(
                "inactive",
                "Get a list of inactive people",
                vec![CommandOption::new(
                    CommandOptionType::Integer,
                    "days",
                    "How many days of quiet makes someone inactive?",
                )],
            ),
        )
        .command(
            CommandKind::Faq,
            "faquser",
            definition(
                "faq",
                "Look up a FAQ topic",
                vec![CommandOption::new(
                    CommandOptionType::String,
                    "topic",
                    "The name of the topic you wish to recall",
                )
                .required()],
            ),
        )
        .command(
            CommandKind::FaqSet,
            "faqadmin",
            definition(
                "faqset",
                "Manage FAQ topics",
                vec![
                    CommandOption::subcommand(
                        "add",
                        "Add a topic to the FAQ",
                        vec![
                            CommandOption::new(
                                CommandOptionType::String,
                                "topic",
                                "The word used to recall this item later",
                            )
                            .required(),
                            CommandOption::new(
                                CommandOptionType::String,
                                "content",
                                "What you want the topic to contain",
                            )
                            .required(),
                        ],
                    ),
                    CommandOption::subcommand(
                        "remove",
                        "Remove a topic from the FAQ",
                        vec![CommandOption::new(
                            CommandOptionType::String,
                            "topic",
                            "The topic to remove",
                        )
                        .required()],
                    ),
                    CommandOption::subcommand("list", "List the known topics in the FAQ", Vec::new()),
                ],
            ),
        )
        .command(
            CommandKind::Vote,
            "vote",
            definition(
                "vote",
                "Initiate a vote",
                vec![CommandOption::new(
                    CommandOptionType::Number,
                    "length",
                    "The number of days the vote should run.",
                )
                .required()
                .range(0.0, MAX_VOTE_DAYS)],
            ),
        )
        .build()
}

/// What the platform should answer, plus a poll draft waiting for the
/// answer's message to be confirmed.
#[derive(Debug)]
pub struct Dispatched {
    pub response: InteractionResponse,
    pub pending: Option<PollDraft>,
}

impl From<InteractionResponse> for Dispatched {
    fn from(response: InteractionResponse) -> Self {
        Self {
            response,
            pending: None,
        }
    }
}

/// Everything a command handler needs from the invoking interaction.
pub struct CommandContext<'a> {
    pub guild_id: i64,
    pub member: &'a InteractionMember,
    pub options: &'a [ResolvedCommandOption],
    pub now: i64,
}

/// Route one interaction. Failures are turned into user-facing responses
/// here; nothing internal leaks into the reply.
pub async fn handle_interaction(state: &AppState, interaction: &Interaction, now: i64) -> Dispatched {
    if interaction.interaction_type == InteractionType::Ping {
        return InteractionResponse::pong().into();
    }
    let (Some(guild_id), Some(member)) = (interaction.guild_id, interaction.member.as_ref()) else {
        return InteractionResponse::ephemeral("This only works inside a server.").into();
    };

    let (op, result) = match interaction.interaction_type {
        InteractionType::ApplicationCommand => {
            let name = interaction
                .data
                .as_ref()
                .and_then(|data| data.name.as_deref())
                .unwrap_or_default();
            ("command", run_command(state, interaction, guild_id, member, name, now).await)
        }
        InteractionType::MessageComponent => {
            ("component", run_component(state, interaction, guild_id, member, now).await)
        }
        InteractionType::ModalSubmit => {
            ("modal", run_modal(state, interaction, guild_id, member, now).await)
        }
        _ => (
            "unsupported",
            Err(CoreError::validation("I don't know how to answer that.")),
        ),
    };

    match result {
        Ok(dispatched) => dispatched,
        Err(err) => failure_response(err, guild_id, op).into(),
    }
}

fn failure_response(err: CoreError, guild_id: i64, op: &str) -> InteractionResponse {
    match err {
        CoreError::Forbidden => InteractionResponse::message(ACCESS_DENIED),
        CoreError::Validation(message) => InteractionResponse::ephemeral(message),
        CoreError::StoreUnavailable(_) => {
            observability::store_failure();
            tracing::error!(guild_id, op, error = %err, "store unavailable while handling interaction");
            InteractionResponse::ephemeral(GENERIC_FAILURE)
        }
        other => {
            tracing::error!(guild_id, op, error = %other, "interaction failed");
            InteractionResponse::ephemeral(GENERIC_FAILURE)
        }
    }
}

async fn run_command(
    state: &AppState,
    interaction: &Interaction,
    guild_id: i64,
    member: &InteractionMember,
    name: &str,
    now: i64,
) -> Result<Dispatched, CoreError> {
    let Some(entry) = state.commands.get(name) else {
        return Err(CoreError::validation(format!("I don't know the command `/{name}`.")));
    };
    observability::command_invoked(name);
    permissions::require_access(&state.db, guild_id, member, &entry.group).await?;

    let options = interaction
        .data
        .as_ref()
        .map(|data| data.options.as_slice())
        .unwrap_or_default();
    let ctx = CommandContext {
        guild_id,
        member,
        options,
        now,
    };
    let response = match entry.kind {
        CommandKind::Access => access::run(state, &ctx).await?,
        CommandKind::Seen => seen::run_seen(state, &ctx).await?,
        CommandKind::Inactive => seen::run_inactive(state, &ctx).await?,
        CommandKind::Faq => faq::run_faq(state, &ctx).await?,
        CommandKind::FaqSet => faq::run_faqset(state, &ctx).await?,
        CommandKind::Vote => vote::run_command(&ctx)?,
    };
    Ok(response.into())
}

async fn run_component(
    state: &AppState,
    interaction: &Interaction,
    guild_id: i64,
    member: &InteractionMember,
    now: i64,
) -> Result<Dispatched, CoreError> {
    let Some(data) = interaction.data.as_ref() else {
        return Err(CoreError::validation("That interaction carried no data."));
    };
    match data.custom_id.as_deref() {
        Some(VOTE_SELECT_ID) => {
            let message = interaction
                .message
                .as_ref()
                .ok_or_else(|| CoreError::validation(NOT_A_POLL_MESSAGE))?;
            let response =
                vote::run_ballot(state, guild_id, message.id, member.user_id, &data.values, now)
                    .await?;
            Ok(response.into())
        }
        _ => Err(CoreError::validation("I don't know what that button does.")),
    }
}

async fn run_modal(
    state: &AppState,
    interaction: &Interaction,
    guild_id: i64,
    member: &InteractionMember,
    now: i64,
) -> Result<Dispatched, CoreError> {
    let Some(data) = interaction.data.as_ref() else {
        return Err(CoreError::validation("That form arrived empty."));
    };
    match data.custom_id.as_deref() {
        Some(VOTE_MODAL_ID) => {
            let group = state
                .commands
                .get("vote")
                .map(|entry| entry.group.as_str())
                .unwrap_or("vote");
            permissions::require_access(&state.db, guild_id, member, group).await?;
            let draft = vote::run_form(guild_id, &data.components, now)?;
            Ok(Dispatched {
                response: InteractionResponse::with_data(
                    InteractionCallbackType::ChannelMessageWithSource,
                    draft.message(now),
                ),
                pending: Some(draft),
            })
        }
        _ => Err(CoreError::validation("I don't know what that form is for.")),
    }
}

/// Value of the first subcommand and its options.
pub(crate) fn subcommand<'a>(
    options: &'a [ResolvedCommandOption],
) -> Result<(&'a str, &'a [ResolvedCommandOption]), CoreError> {
    match options {
        [only] if only.option_type == CommandOptionType::SubCommand => {
            Ok((only.name.as_str(), only.options.as_slice()))
        }
        _ => Err(CoreError::validation("That command needs a subcommand.")),
    }
}

pub(crate) fn required_str<'a>(
    options: &'a [ResolvedCommandOption],
    name: &str,
) -> Result<&'a str, CoreError> {
    find_option(options, name)
        .and_then(ResolvedCommandOption::as_str)
        .ok_or_else(|| CoreError::validation(format!("Missing `{name}`.")))
}

pub(crate) fn required_id(options: &[ResolvedCommandOption], name: &str) -> Result<i64, CoreError> {
    find_option(options, name)
        .and_then(ResolvedCommandOption::as_i64)
        .ok_or_else(|| CoreError::validation(format!("Missing `{name}`.")))
}
