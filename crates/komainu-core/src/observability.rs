use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

const COMMAND_FALLBACK: &str = "other";
const MAX_COMMAND_NAME_LEN: usize = 32;
const MAX_COMMAND_KEYS: usize = 64;

static BALLOTS_RECORDED: AtomicU64 = AtomicU64::new(0);
static BALLOTS_REJECTED: AtomicU64 = AtomicU64::new(0);
static CONFLICT_RETRIES: AtomicU64 = AtomicU64::new(0);
static STORE_FAILURES: AtomicU64 = AtomicU64::new(0);
static COMMANDS_BY_NAME: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

fn lock_commands_by_name() -> std::sync::MutexGuard<'static, HashMap<String, u64>> {
    let map = COMMANDS_BY_NAME.get_or_init(|| Mutex::new(HashMap::new()));
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn normalize_command_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_COMMAND_NAME_LEN {
        return COMMAND_FALLBACK.to_string();
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
    {
        return COMMAND_FALLBACK.to_string();
    }
    trimmed.to_string()
}

pub fn ballot_recorded() {
    BALLOTS_RECORDED.fetch_add(1, Ordering::Relaxed);
}

pub fn ballot_rejected() {
    BALLOTS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn conflict_retried() {
    CONFLICT_RETRIES.fetch_add(1, Ordering::Relaxed);
}

pub fn store_failure() {
    STORE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn command_invoked(name: &str) {
    let mut normalized = normalize_command_name(name);
    let mut by_name = lock_commands_by_name();
    if !by_name.contains_key(&normalized) && by_name.len() >= MAX_COMMAND_KEYS {
        normalized = COMMAND_FALLBACK.to_string();
    }
    let entry = by_name.entry(normalized).or_insert(0);
    *entry = entry.saturating_add(1);
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub ballots_recorded: u64,
    pub ballots_rejected: u64,
    pub conflict_retries: u64,
    pub store_failures: u64,
    pub commands: Vec<(String, u64)>,
}

pub fn snapshot() -> MetricsSnapshot {
    let mut commands: Vec<(String, u64)> = lock_commands_by_name()
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    commands.sort_by(|a, b| a.0.cmp(&b.0));

    MetricsSnapshot {
        ballots_recorded: BALLOTS_RECORDED.load(Ordering::Relaxed),
        ballots_rejected: BALLOTS_REJECTED.load(Ordering::Relaxed),
        conflict_retries: CONFLICT_RETRIES.load(Ordering::Relaxed),
        store_failures: STORE_FAILURES.load(Ordering::Relaxed),
        commands,
    }
}
