//! Tenant-scoped record storage.
//!
//! Every record lives at a `(tenant_id, category, key)` triple. Functions
//! take any SQLite executor, so they work against the pool directly or
//! inside an open transaction (`&mut *tx`).

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqliteExecutor;

use crate::{codec, DbError, DbPool};

pub const ACCESS: &str = "access";
pub const VOTES: &str = "votes";
pub const SEEN: &str = "seen";
pub const FAQ: &str = "faq";

/// What a read-modify-write closure wants done with the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Keep,
    Put(T),
    Remove,
}

pub async fn get_raw<'e, E>(
    executor: E,
    tenant_id: i64,
    category: &str,
    key: &str,
) -> Result<Option<Vec<u8>>, DbError>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<(Vec<u8>,)> = sqlx::query_as(
        "SELECT payload FROM tenant_records
         WHERE tenant_id = ?1 AND category = ?2 AND record_key = ?3",
    )
    .bind(tenant_id)
    .bind(category)
    .bind(key)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|(payload,)| payload))
}

/// Load and decode a record. `None` means nothing is stored at the triple.
pub async fn get_object<'e, E, T>(
    executor: E,
    tenant_id: i64,
    category: &str,
    key: &str,
) -> Result<Option<T>, DbError>
where
    E: SqliteExecutor<'e>,
    T: DeserializeOwned,
{
    let Some(payload) = get_raw(executor, tenant_id, category, key).await? else {
        return Ok(None);
    };
    decode_payload(tenant_id, category, key, &payload).map(Some)
}

fn decode_payload<T: DeserializeOwned>(
    tenant_id: i64,
    category: &str,
    key: &str,
    payload: &[u8],
) -> Result<T, DbError> {
    codec::decode(payload).map_err(|source| {
        tracing::error!(
            tenant_id,
            category,
            key,
            error = %source,
            "stored record does not match its expected shape"
        );
        DbError::Decode {
            tenant_id,
            category: category.to_string(),
            key: key.to_string(),
            source,
        }
    })
}

/// Write a record, replacing whatever was stored at the triple.
pub async fn set<'e, E, T>(
    executor: E,
    tenant_id: i64,
    category: &str,
    key: &str,
    value: &T,
) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
    T: Serialize + ?Sized,
{
    let payload = codec::encode(value).map_err(DbError::Encode)?;
    sqlx::query(
        "INSERT INTO tenant_records (tenant_id, category, record_key, payload, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (tenant_id, category, record_key) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at",
    )
    .bind(tenant_id)
    .bind(category)
    .bind(key)
    .bind(payload)
    .bind(Utc::now().timestamp())
    .execute(executor)
    .await?;
    Ok(())
}

/// Remove a record. Returns whether anything was removed; absent is a no-op.
pub async fn delete<'e, E>(
    executor: E,
    tenant_id: i64,
    category: &str,
    key: &str,
) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "DELETE FROM tenant_records
         WHERE tenant_id = ?1 AND category = ?2 AND record_key = ?3",
    )
    .bind(tenant_id)
    .bind(category)
    .bind(key)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn exists<'e, E>(
    executor: E,
    tenant_id: i64,
    category: &str,
    key: &str,
) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM tenant_records
         WHERE tenant_id = ?1 AND category = ?2 AND record_key = ?3",
    )
    .bind(tenant_id)
    .bind(category)
    .bind(key)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

/// Keys stored under a tenant's category, ascending.
pub async fn list_keys<'e, E>(
    executor: E,
    tenant_id: i64,
    category: &str,
) -> Result<Vec<String>, DbError>
where
    E: SqliteExecutor<'e>,
{
    let keys: Vec<String> = sqlx::query_scalar(
        "SELECT record_key FROM tenant_records
         WHERE tenant_id = ?1 AND category = ?2
         ORDER BY record_key",
    )
    .bind(tenant_id)
    .bind(category)
    .fetch_all(executor)
    .await?;
    Ok(keys)
}

/// Every record under a tenant's category, decoded, ordered by key.
pub async fn list_objects<'e, E, T>(
    executor: E,
    tenant_id: i64,
    category: &str,
) -> Result<Vec<(String, T)>, DbError>
where
    E: SqliteExecutor<'e>,
    T: DeserializeOwned,
{
    let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
        "SELECT record_key, payload FROM tenant_records
         WHERE tenant_id = ?1 AND category = ?2
         ORDER BY record_key",
    )
    .bind(tenant_id)
    .bind(category)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|(key, payload)| {
            let value = decode_payload(tenant_id, category, &key, &payload)?;
            Ok((key, value))
        })
        .collect()
}

/// Load a record, let `apply` decide its new state, and write that state back,
/// all inside one transaction.
///
/// The transaction starts with `BEGIN IMMEDIATE`, so concurrent writers queue
/// on the write lock for up to the pool's busy timeout instead of failing on a
/// stale snapshot. If the lock cannot be taken in time this returns
/// [`DbError::Conflict`] with nothing applied; the caller re-runs the whole
/// call and `apply` then sees the fresh value.
pub async fn read_modify_write<T, R, F>(
    pool: &DbPool,
    tenant_id: i64,
    category: &str,
    key: &str,
    apply: F,
) -> Result<R, DbError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> (Mutation<T>, R),
{
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    let current: Option<T> = get_object(&mut *tx, tenant_id, category, key).await?;
    let (mutation, result) = apply(current);

    match mutation {
        Mutation::Keep => {}
        Mutation::Put(value) => set(&mut *tx, tenant_id, category, key, &value).await?,
        Mutation::Remove => {
            delete(&mut *tx, tenant_id, category, key).await?;
        }
    }

    tx.commit().await?;
    Ok(result)
}
