use thiserror::Error;

#[cfg(feature = "sqlite")]
use deadpool_sqlite::rusqlite;

use crate::types::Backend;

/// Unified error type for every repository operation.
///
/// Driver and pool errors pass through transparently; the structured variants
/// cover configuration, routing, and parameter-binding failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] deadpool::managed::PoolError<tokio_postgres::Error>),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolErrorSqlite(#[from] deadpool::managed::PoolError<rusqlite::Error>),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    PoolErrorMssql(#[from] deadpool::managed::PoolError<tiberius::error::Error>),

    #[error("no connection string configured for the {0} backend; pass one per call or configure a default")]
    MissingConnectionString(Backend),

    #[error("invalid parameter spec: {0}")]
    InvalidSpec(String),

    #[error("unsupported parameter type: {0}")]
    UnsupportedType(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

#[cfg(feature = "sqlite")]
impl From<deadpool_sqlite::InteractError> for RepositoryError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        RepositoryError::Other(format!("SQLite interact error: {err}"))
    }
}
