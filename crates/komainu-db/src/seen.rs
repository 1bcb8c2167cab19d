use sqlx::SqliteExecutor;

use crate::records::{self, Mutation, SEEN};
use crate::{DbError, DbPool};

/// Last activity of `user_id` in the guild, in epoch seconds.
pub async fn last_seen<'e, E>(
    executor: E,
    guild_id: i64,
    user_id: i64,
) -> Result<Option<i64>, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::get_object(executor, guild_id, SEEN, &user_id.to_string()).await
}

/// Record activity at `timestamp`. Older timestamps never replace newer ones,
/// so late-delivered events cannot move "last seen" backwards. Returns whether
/// the stored value changed.
pub async fn record_seen(
    pool: &DbPool,
    guild_id: i64,
    user_id: i64,
    timestamp: i64,
) -> Result<bool, DbError> {
    records::read_modify_write(
        pool,
        guild_id,
        SEEN,
        &user_id.to_string(),
        |current: Option<i64>| match current {
            Some(stored) if stored >= timestamp => (Mutation::Keep, false),
            _ => (Mutation::Put(timestamp), true),
        },
    )
    .await
}

/// All users with recorded activity in the guild, as `(user_id, last_seen)`.
pub async fn seen_users<'e, E>(executor: E, guild_id: i64) -> Result<Vec<(i64, i64)>, DbError>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<(String, i64)> = records::list_objects(executor, guild_id, SEEN).await?;
    let mut users = Vec::with_capacity(rows.len());
    for (key, timestamp) in rows {
        match key.parse::<i64>() {
            Ok(user_id) => users.push((user_id, timestamp)),
            Err(_) => tracing::warn!(guild_id, key = %key, "ignoring seen record with non-numeric key"),
        }
    }
    Ok(users)
}
