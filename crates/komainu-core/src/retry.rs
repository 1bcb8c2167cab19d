use komainu_db::DbError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::CoreError;
use crate::observability;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Full-jitter exponential backoff before attempt `attempt + 1`.
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay);
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling_ms))
    }
}

/// Run a complete read-modify-write, re-running it from scratch while the
/// store reports a conflicting writer. Exhausting the budget is reported as
/// [`CoreError::StoreUnavailable`]; other failures are returned at once.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    op: &'static str,
    mut attempt: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut tries: u32 = 0;
    loop {
        tries = tries.saturating_add(1);
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() && tries < policy.max_attempts.max(1) => {
                observability::conflict_retried();
                let delay = policy.backoff(tries);
                tracing::debug!(op, attempt = tries, ?delay, "write conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_conflict() => {
                tracing::warn!(op, attempts = tries, "giving up after repeated write conflicts");
                return Err(CoreError::StoreUnavailable(err));
            }
            Err(err) => return Err(err.into()),
        }
    }
}
