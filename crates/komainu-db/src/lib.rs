pub mod access;
pub mod codec;
pub mod faq;
pub mod records;
pub mod seen;
pub mod votes;

pub use sqlx;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = sqlx::SqlitePool;

// Primary SQLite result codes; extended codes carry these in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum DbError {
    /// The durable medium could not be reached or written.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    /// A concurrent writer won; the whole read-modify-write must be retried.
    #[error("transaction aborted by a conflicting writer: {0}")]
    Conflict(#[source] sqlx::Error),
    #[error("stored record {tenant_id}/{category}/{key} could not be decoded: {source}")]
    Decode {
        tenant_id: i64,
        category: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("record could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if is_conflict(&err) {
            DbError::Conflict(err)
        } else {
            DbError::Unavailable(err)
        }
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a statement waits on SQLite's write lock before failing.
    pub busy_timeout: Duration,
    /// How long a caller waits for a pooled connection.
    pub acquire_timeout: Duration,
}

impl StoreOptions {
    pub fn new(database_url: &str, max_connections: u32) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    create_pool_with_options(&StoreOptions::new(database_url, max_connections)).await
}

pub async fn create_pool_with_options(options: &StoreOptions) -> Result<DbPool, sqlx::Error> {
    let connect = SqliteConnectOptions::from_str(&options.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .busy_timeout(options.busy_timeout);

    SqlitePoolOptions::new()
        .max_connections(options.max_connections.max(1))
        .acquire_timeout(options.acquire_timeout)
        .connect_with(connect)
        .await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations: applied successfully");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool(max_connections: u32) -> DbPool {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let unique = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let db_path = std::env::temp_dir().join(format!("komainu-db-{unique}-{seq}.db"));
    let db_url = format!(
        "sqlite://{}?mode=rwc",
        db_path.to_string_lossy().replace('\\', "/")
    );

    let pool = create_pool(&db_url, max_connections).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::{create_pool, run_migrations, DbError};

    #[tokio::test]
    async fn create_pool_supports_default_sqlite_mode() {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        let value: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query");
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn migrations_create_tenant_records() {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        run_migrations(&pool).await.expect("migrations");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenant_records")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable_not_conflict() {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        pool.close().await;
        let err: DbError = sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .expect_err("closed pool must fail")
            .into();
        assert!(matches!(err, DbError::Unavailable(_)));
        assert!(!err.is_conflict());
    }
}
