use sqlx::SqliteExecutor;

use crate::records::{self, FAQ};
use crate::DbError;

/// Topics are matched case-insensitively and without surrounding whitespace.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

pub async fn get_entry<'e, E>(
    executor: E,
    guild_id: i64,
    topic: &str,
) -> Result<Option<String>, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::get_object(executor, guild_id, FAQ, &normalize_topic(topic)).await
}

pub async fn set_entry<'e, E>(
    executor: E,
    guild_id: i64,
    topic: &str,
    content: &str,
) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    records::set(executor, guild_id, FAQ, &normalize_topic(topic), content).await
}

pub async fn remove_entry<'e, E>(executor: E, guild_id: i64, topic: &str) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::delete(executor, guild_id, FAQ, &normalize_topic(topic)).await
}

pub async fn list_topics<'e, E>(executor: E, guild_id: i64) -> Result<Vec<String>, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::list_keys(executor, guild_id, FAQ).await
}
