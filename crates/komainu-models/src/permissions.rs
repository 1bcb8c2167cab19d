use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Platform permission bits, as delivered with the invoking member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: i64 {
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS = 1 << 1;
        const BAN_MEMBERS = 1 << 2;
        const ADMINISTRATOR = 1 << 3;
        const MANAGE_CHANNELS = 1 << 4;
        const MANAGE_GUILD = 1 << 5;
        const VIEW_CHANNEL = 1 << 10;
        const SEND_MESSAGES = 1 << 11;
        const MANAGE_MESSAGES = 1 << 13;
        const MANAGE_ROLES = 1 << 28;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

// The platform sends permission sets as decimal strings.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.bits().to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }
        let bits = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                serde::de::Error::custom(format!("invalid permission bits: {text}"))
            })?,
            Raw::Number(bits) => bits,
        };
        Ok(Self::from_bits_truncate(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_string_and_number_forms() {
        let from_text: Permissions = serde_json::from_str("\"8\"").expect("text");
        let from_number: Permissions = serde_json::from_str("8").expect("number");
        assert_eq!(from_text, Permissions::ADMINISTRATOR);
        assert_eq!(from_number, Permissions::ADMINISTRATOR);
    }

    #[test]
    fn unknown_bits_are_dropped() {
        let perms: Permissions = serde_json::from_str("\"1099511627784\"").expect("bits");
        assert!(perms.contains(Permissions::ADMINISTRATOR));
        assert_eq!(perms.bits(), Permissions::ADMINISTRATOR.bits());
    }
}
