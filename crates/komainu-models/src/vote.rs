use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of options a poll may carry (one string-select menu).
pub const MAX_VOTE_OPTIONS: usize = 25;
/// Option labels longer than this are truncated, not rejected.
pub const MAX_OPTION_LABEL_CHARS: usize = 100;
pub const MIN_QUESTION_CHARS: usize = 1;
pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_VOTE_DAYS: f64 = 365.0;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Stable option key for the option at `position` in creation order.
pub fn option_key(position: usize) -> String {
    format!("opt/{position}")
}

/// A persisted poll. Everything except `votes` is fixed once the record is
/// first written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub start_time: i64,
    pub end_time: i64,
    pub guild_id: i64,
    /// Filled in once the rendering message is confirmed.
    #[serde(default)]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub message_id: Option<i64>,
    pub question: String,
    /// option key -> display label
    pub options: HashMap<String, String>,
    /// Presentation order of option keys. `options` has no usable order.
    pub order: Vec<String>,
    /// voter user id -> chosen option key
    #[serde(default)]
    pub votes: HashMap<i64, String>,
}

impl Vote {
    pub fn is_open(&self, now: i64) -> bool {
        now < self.end_time
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Iterate `(key, label)` pairs in presentation order.
    pub fn ordered_options(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.options.get(key).map(|label| (key.as_str(), label.as_str())))
    }
}
