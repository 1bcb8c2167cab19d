use komainu_models::vote::Vote;
use sqlx::SqliteExecutor;

use crate::records::{self, Mutation, VOTES};
use crate::{DbError, DbPool};

/// Votes are keyed by the id of the message that renders them.
pub fn vote_key(message_id: i64) -> String {
    message_id.to_string()
}

pub async fn get_vote<'e, E>(
    executor: E,
    guild_id: i64,
    message_id: i64,
) -> Result<Option<Vote>, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::get_object(executor, guild_id, VOTES, &vote_key(message_id)).await
}

pub async fn store_vote<'e, E>(
    executor: E,
    guild_id: i64,
    message_id: i64,
    vote: &Vote,
) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    records::set(executor, guild_id, VOTES, &vote_key(message_id), vote).await
}

pub async fn delete_vote<'e, E>(executor: E, guild_id: i64, message_id: i64) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::delete(executor, guild_id, VOTES, &vote_key(message_id)).await
}

/// Transactional read-modify-write of one vote record.
pub async fn update_vote<R, F>(
    pool: &DbPool,
    guild_id: i64,
    message_id: i64,
    apply: F,
) -> Result<R, DbError>
where
    F: FnOnce(Option<Vote>) -> (Mutation<Vote>, R),
{
    records::read_modify_write(pool, guild_id, VOTES, &vote_key(message_id), apply).await
}
