use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::polls::PollDraft;

struct PendingPoll {
    draft: PollDraft,
    created: Instant,
}

/// Poll drafts answered to the platform but not yet confirmed, keyed by the
/// interaction that created them. Entries live only in this process: losing
/// one means the poll is never stored, which is the safe direction.
pub struct PendingPolls {
    drafts: DashMap<i64, PendingPoll>,
}

impl PendingPolls {
    pub fn new() -> Self {
        Self {
            drafts: DashMap::new(),
        }
    }

    /// Park a draft until its message is confirmed. A second draft for the
    /// same interaction replaces the first.
    pub fn insert(&self, interaction_id: i64, draft: PollDraft) {
        self.drafts.insert(
            interaction_id,
            PendingPoll {
                draft,
                created: Instant::now(),
            },
        );
    }

    /// Remove and return the draft for `interaction_id` unless it is older than `ttl`.
    pub fn take(&self, interaction_id: i64, ttl: Duration) -> Option<PollDraft> {
        let (_, pending) = self.drafts.remove(&interaction_id)?;
        if pending.created.elapsed() > ttl {
            tracing::debug!(interaction_id, "discarding expired poll draft");
            return None;
        }
        Some(pending.draft)
    }

    /// Drop every draft older than `ttl`. Returns how many were dropped.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, pending| pending.created.elapsed() <= ttl);
        before.saturating_sub(self.drafts.len())
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

impl Default for PendingPolls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PollDraft {
        PollDraft::new(1, 1_700_000_000, 1.0, "Lunch?", "Pizza\nTacos").expect("draft")
    }

    #[test]
    fn take_returns_draft_once() {
        let pending = PendingPolls::new();
        pending.insert(9, draft());
        assert_eq!(pending.take(9, Duration::from_secs(60)), Some(draft()));
        assert_eq!(pending.take(9, Duration::from_secs(60)), None);
        assert!(pending.is_empty());
    }

    #[test]
    fn expired_drafts_are_not_returned() {
        let pending = PendingPolls::new();
        pending.insert(9, draft());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pending.take(9, Duration::ZERO), None);
    }

    #[test]
    fn sweep_drops_only_expired() {
        let pending = PendingPolls::new();
        pending.insert(1, draft());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pending.sweep_expired(Duration::from_secs(60)), 0);
        assert_eq!(pending.sweep_expired(Duration::ZERO), 1);
        assert_eq!(pending.len(), 0);
    }
}
