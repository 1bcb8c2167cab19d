use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentType {
    ActionRow = 1,
    Button = 2,
    StringSelect = 3,
    TextInput = 4,
    UserSelect = 5,
    RoleSelect = 6,
    MentionableSelect = 7,
    ChannelSelect = 8,
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ComponentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        match value {
            1 => Ok(Self::ActionRow),
            2 => Ok(Self::Button),
            3 => Ok(Self::StringSelect),
            4 => Ok(Self::TextInput),
            5 => Ok(Self::UserSelect),
            6 => Ok(Self::RoleSelect),
            7 => Ok(Self::MentionableSelect),
            8 => Ok(Self::ChannelSelect),
            _ => Err(serde::de::Error::custom(format!(
                "unknown ComponentType: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextInputStyle {
    Short = 1,
    Paragraph = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// A flat component struct that uses `component_type` to distinguish variants.
///
/// Using a flat struct avoids serde `tag` conflicts with the integer `type`
/// discriminator. Fields that don't apply to a given component type are simply
/// `None` / empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Child components (only for ActionRow)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Text input style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Options for string select menus
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Pre-filled value for text inputs, submitted value in modal payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Component {
    fn empty(component_type: ComponentType) -> Self {
        Self {
            component_type,
            components: Vec::new(),
            custom_id: None,
            style: None,
            label: None,
            disabled: false,
            options: Vec::new(),
            placeholder: None,
            min_values: None,
            max_values: None,
            min_length: None,
            max_length: None,
            required: None,
            value: None,
        }
    }

    pub fn action_row(components: Vec<Component>) -> Self {
        Self {
            components,
            ..Self::empty(ComponentType::ActionRow)
        }
    }

    /// Single-choice string select menu.
    pub fn string_select(custom_id: &str, placeholder: &str, options: Vec<SelectOption>) -> Self {
        Self {
            custom_id: Some(custom_id.to_string()),
            placeholder: Some(placeholder.to_string()),
            options,
            min_values: Some(0),
            max_values: Some(1),
            ..Self::empty(ComponentType::StringSelect)
        }
    }

    pub fn text_input(custom_id: &str, label: &str, style: TextInputStyle) -> Self {
        Self {
            custom_id: Some(custom_id.to_string()),
            label: Some(label.to_string()),
            style: Some(style as u8),
            ..Self::empty(ComponentType::TextInput)
        }
    }

    pub fn length_limits(mut self, min: u32, max: u32) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

/// Flatten submitted modal rows into `(custom_id, value)` pairs.
pub fn modal_values(components: &[Component]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for component in components {
        if component.component_type == ComponentType::ActionRow {
            out.extend(modal_values(&component.components));
            continue;
        }
        if let (Some(id), Some(value)) = (&component.custom_id, &component.value) {
            out.push((id.clone(), value.clone()));
        }
    }
    out
}
