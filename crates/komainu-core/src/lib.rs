pub mod commands;
pub mod error;
pub mod observability;
pub mod pending;
pub mod permissions;
pub mod polls;
pub mod retry;

use commands::CommandRegistry;
use komainu_db::DbPool;
use pending::PendingPolls;
use retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Message shown to users for any failure they cannot act on.
pub const GENERIC_FAILURE: &str = "Something went wrong. It was logged, so hopefully it'll get fixed.";

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    /// Built once at startup; never mutated afterwards.
    pub commands: Arc<CommandRegistry>,
    /// Poll drafts waiting for the platform to confirm their message.
    pub pending_polls: Arc<PendingPolls>,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, commands: CommandRegistry) -> Self {
        Self {
            db,
            config,
            commands: Arc::new(commands),
            pending_polls: Arc::new(PendingPolls::new()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// The bot's own user id, so `/seen` can recognise itself.
    pub application_user_id: Option<i64>,
    pub retry: RetryPolicy,
    /// Unconfirmed poll drafts older than this are discarded.
    pub pending_poll_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_user_id: None,
            retry: RetryPolicy::default(),
            pending_poll_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Current wall-clock time in epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
