#[cfg(feature = "postgres")]
use deadpool_postgres::{Object as PostgresObject, Pool as DeadpoolPostgresPool};

#[cfg(feature = "sqlite")]
use deadpool_sqlite::{Object as SqliteObject, Pool as DeadpoolSqlitePool};

#[cfg(feature = "mssql")]
use crate::mssql::{MssqlManager, MssqlPool};

use crate::error::RepositoryError;
use crate::types::Backend;

/// Connection pool for one backend.
///
/// This enum wraps the different connection pool types for the supported
/// database engines; cloning is cheap (the pools are handles).
#[derive(Clone)]
pub enum BackendPool {
    /// SQL Server connection pool
    #[cfg(feature = "mssql")]
    Mssql(MssqlPool),
    /// `PostgreSQL` connection pool
    #[cfg(feature = "postgres")]
    Postgres(DeadpoolPostgresPool),
    /// `SQLite` connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(DeadpoolSqlitePool),
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "mssql")]
            Self::Mssql(_) => f.debug_tuple("Mssql").field(&"<pool>").finish(),
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").field(&"<pool>").finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<pool>").finish(),
        }
    }
}

impl BackendPool {
    /// Build a pool for a backend from its connection string.
    ///
    /// # Errors
    ///
    /// `RepositoryError::ConfigError` for an unparseable connection string,
    /// `RepositoryError::ConnectionError` when pool construction fails.
    pub async fn build(
        backend: Backend,
        connection: &str,
        max_size: usize,
    ) -> Result<Self, RepositoryError> {
        match backend {
            #[cfg(feature = "mssql")]
            Backend::Mssql => crate::mssql::build_pool(connection, max_size).map(Self::Mssql),
            #[cfg(feature = "postgres")]
            Backend::Postgres => {
                crate::postgres::build_pool(connection, max_size).map(Self::Postgres)
            }
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => crate::sqlite::build_pool(connection, max_size)
                .await
                .map(Self::Sqlite),
        }
    }

    /// The backend this pool serves.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "mssql")]
            Self::Mssql(_) => Backend::Mssql,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => Backend::Postgres,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Pool checkout failures pass through as the matching pool-error
    /// variant.
    pub async fn get_connection(&self) -> Result<PoolConnection, RepositoryError> {
        match self {
            #[cfg(feature = "mssql")]
            BackendPool::Mssql(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(RepositoryError::PoolErrorMssql)?;
                Ok(PoolConnection::Mssql(conn))
            }
            #[cfg(feature = "postgres")]
            BackendPool::Postgres(pool) => {
                let conn: PostgresObject = pool
                    .get()
                    .await
                    .map_err(RepositoryError::PoolErrorPostgres)?;
                Ok(PoolConnection::Postgres(conn))
            }
            #[cfg(feature = "sqlite")]
            BackendPool::Sqlite(pool) => {
                let conn: SqliteObject = pool
                    .get()
                    .await
                    .map_err(RepositoryError::PoolErrorSqlite)?;
                Ok(PoolConnection::Sqlite(conn))
            }
        }
    }
}

/// A checked-out connection for one backend.
pub enum PoolConnection {
    #[cfg(feature = "mssql")]
    Mssql(deadpool::managed::Object<MssqlManager>),
    #[cfg(feature = "postgres")]
    Postgres(PostgresObject),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteObject),
}

impl PoolConnection {
    /// The backend this connection talks to.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "mssql")]
            Self::Mssql(_) => Backend::Mssql,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => Backend::Postgres,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => Backend::Sqlite,
        }
    }
}
