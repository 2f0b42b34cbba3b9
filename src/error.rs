use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Upstream could not be reached or returned something unusable. Retried on the next tick.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // SQLSTATE class 23 covers unique, foreign key, check and not-null violations
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().is_some_and(|code| code.starts_with("23")) {
                return Error::ConstraintViolation(db_err.message().to_string());
            }
        }
        Error::Database(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::SourceUnavailable(err.to_string())
    }
}
