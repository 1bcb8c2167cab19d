use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::command::CommandOptionType;
use crate::component::Component;
use crate::permissions::Permissions;

/// Message flag: only the invoking user sees the response.
pub const MESSAGE_FLAG_EPHEMERAL: u32 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionType {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

impl Serialize for InteractionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for InteractionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        match value {
            1 => Ok(Self::Ping),
            2 => Ok(Self::ApplicationCommand),
            3 => Ok(Self::MessageComponent),
            4 => Ok(Self::ApplicationCommandAutocomplete),
            5 => Ok(Self::ModalSubmit),
            _ => Err(serde::de::Error::custom(format!(
                "unknown InteractionType: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionCallbackType {
    Pong = 1,
    ChannelMessageWithSource = 4,
    DeferredChannelMessageWithSource = 5,
    DeferredUpdateMessage = 6,
    UpdateMessage = 7,
    ApplicationCommandAutocompleteResult = 8,
    Modal = 9,
}

impl Serialize for InteractionCallbackType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for InteractionCallbackType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        match value {
            1 => Ok(Self::Pong),
            4 => Ok(Self::ChannelMessageWithSource),
            5 => Ok(Self::DeferredChannelMessageWithSource),
            6 => Ok(Self::DeferredUpdateMessage),
            7 => Ok(Self::UpdateMessage),
            8 => Ok(Self::ApplicationCommandAutocompleteResult),
            9 => Ok(Self::Modal),
            _ => Err(serde::de::Error::custom(format!(
                "unknown InteractionCallbackType: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedCommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub option_type: CommandOptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub options: Vec<ResolvedCommandOption>,
}

impl ResolvedCommandOption {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(|v| v.as_str())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(|v| v.as_f64())
    }

    /// Integers and snowflakes; the platform sends snowflakes as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Find a named option among resolved command options.
pub fn find_option<'a>(
    options: &'a [ResolvedCommandOption],
    name: &str,
) -> Option<&'a ResolvedCommandOption> {
    options.iter().find(|opt| opt.name == name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionData {
    /// Command name (for application command interactions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<ResolvedCommandOption>,
    /// Custom ID (for message component and modal interactions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<u8>,
    /// Selected values (for select menu interactions)
    #[serde(default)]
    pub values: Vec<String>,
    /// Modal components (for modal submit)
    #[serde(default)]
    pub components: Vec<Component>,
}

/// The invoking guild member, with permissions already resolved for the
/// channel by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionMember {
    pub user_id: i64,
    #[serde(default)]
    pub roles: Vec<i64>,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: i64,
    pub channel_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<InteractionMember>,
    /// The message a component was attached to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowedMentions {
    #[serde(default)]
    pub parse: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub response_type: InteractionCallbackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
    /// Modal title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Modal custom_id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            response_type: InteractionCallbackType::Pong,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self::with_data(
            InteractionCallbackType::ChannelMessageWithSource,
            InteractionCallbackData {
                content: Some(content.into()),
                ..Default::default()
            },
        )
    }

    /// A message that cannot ping anyone it mentions.
    pub fn message_no_mention(content: impl Into<String>) -> Self {
        Self::with_data(
            InteractionCallbackType::ChannelMessageWithSource,
            InteractionCallbackData {
                content: Some(content.into()),
                allowed_mentions: Some(AllowedMentions::default()),
                ..Default::default()
            },
        )
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::with_data(
            InteractionCallbackType::ChannelMessageWithSource,
            InteractionCallbackData {
                content: Some(content.into()),
                flags: Some(MESSAGE_FLAG_EPHEMERAL),
                ..Default::default()
            },
        )
    }

    pub fn modal(custom_id: &str, title: &str, inputs: Vec<Component>) -> Self {
        Self::with_data(
            InteractionCallbackType::Modal,
            InteractionCallbackData {
                custom_id: Some(custom_id.to_string()),
                title: Some(title.to_string()),
                components: inputs
                    .into_iter()
                    .map(|input| Component::action_row(vec![input]))
                    .collect(),
                ..Default::default()
            },
        )
    }

    pub fn with_data(response_type: InteractionCallbackType, data: InteractionCallbackData) -> Self {
        Self {
            response_type,
            data: Some(data),
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.content.as_deref())
    }

    pub fn is_ephemeral(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.flags)
            .map(|flags| flags & MESSAGE_FLAG_EPHEMERAL != 0)
            .unwrap_or(false)
    }
}
