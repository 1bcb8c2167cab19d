use komainu_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller input broke a stated constraint. The message is shown to the user.
    #[error("{0}")]
    Validation(String),
    #[error("access denied")]
    Forbidden,
    /// The store could not be reached, or conflicts persisted past the retry budget.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] DbError),
    /// A stored record no longer matches its expected shape.
    #[error("corrupt record: {0}")]
    Corrupt(#[source] DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Decode { .. } => CoreError::Corrupt(e),
            DbError::Encode(err) => CoreError::Internal(format!("record encoding failed: {err}")),
            DbError::Unavailable(_) | DbError::Conflict(_) => CoreError::StoreUnavailable(e),
        }
    }
}
