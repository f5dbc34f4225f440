//! The async execution seam implemented by pooled connections.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::params::ParamSet;
use crate::pool::PoolConnection;
use crate::results::ResultSet;
use crate::types::SqlValue;

#[cfg(feature = "mssql")]
use crate::mssql;
#[cfg(feature = "postgres")]
use crate::postgres;
#[cfg(feature = "sqlite")]
use crate::sqlite;

/// A unified async API over every supported backend.
#[async_trait]
pub trait DatabaseExecutor {
    /// Executes a batch of SQL statements (can be a mix of reads/writes) within a transaction. No parameters are supported.
    async fn execute_batch(&mut self, query: &str) -> Result<(), RepositoryError>;

    /// Executes a single SELECT statement and returns the result set.
    async fn execute_select(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, RepositoryError>;

    /// Executes a single DML statement (INSERT, UPDATE, DELETE, etc.) and returns the number of rows affected.
    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<usize, RepositoryError>;

    /// Executes a SELECT statement and returns the first column of the first
    /// row, or `None` when the query produced no rows.
    async fn execute_scalar(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlValue>, RepositoryError>;

    /// Invokes a stored procedure, returning the parameter set with any
    /// output and return slots populated.
    async fn execute_procedure(
        &mut self,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<ParamSet, RepositoryError>;
}

#[async_trait]
impl DatabaseExecutor for PoolConnection {
    /// Executes a batch of SQL statements within a transaction by delegating to the specific database module.
    async fn execute_batch(&mut self, query: &str) -> Result<(), RepositoryError> {
        match self {
            #[cfg(feature = "postgres")]
            PoolConnection::Postgres(pg_client) => postgres::execute_batch(pg_client, query).await,
            #[cfg(feature = "sqlite")]
            PoolConnection::Sqlite(sqlite_client) => {
                sqlite::execute_batch(sqlite_client, query).await
            }
            #[cfg(feature = "mssql")]
            PoolConnection::Mssql(mssql_client) => mssql::execute_batch(mssql_client, query).await,
        }
    }

    async fn execute_select(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, RepositoryError> {
        match self {
            #[cfg(feature = "postgres")]
            PoolConnection::Postgres(pg_client) => {
                postgres::execute_select(pg_client, query, params).await
            }
            #[cfg(feature = "sqlite")]
            PoolConnection::Sqlite(sqlite_client) => {
                sqlite::execute_select(sqlite_client, query, params).await
            }
            #[cfg(feature = "mssql")]
            PoolConnection::Mssql(mssql_client) => {
                mssql::execute_select(mssql_client, query, params).await
            }
        }
    }

    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<usize, RepositoryError> {
        match self {
            #[cfg(feature = "postgres")]
            PoolConnection::Postgres(pg_client) => {
                postgres::execute_dml(pg_client, query, params).await
            }
            #[cfg(feature = "sqlite")]
            PoolConnection::Sqlite(sqlite_client) => {
                sqlite::execute_dml(sqlite_client, query, params).await
            }
            #[cfg(feature = "mssql")]
            PoolConnection::Mssql(mssql_client) => {
                mssql::execute_dml(mssql_client, query, params).await
            }
        }
    }

    async fn execute_scalar(
        &mut self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlValue>, RepositoryError> {
        let result_set = self.execute_select(query, params).await?;
        Ok(result_set.scalar().cloned())
    }

    async fn execute_procedure(
        &mut self,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<ParamSet, RepositoryError> {
        match self {
            #[cfg(feature = "postgres")]
            PoolConnection::Postgres(pg_client) => {
                postgres::execute_procedure(pg_client, procedure, params).await
            }
            #[cfg(feature = "sqlite")]
            PoolConnection::Sqlite(sqlite_client) => {
                sqlite::execute_procedure(sqlite_client, procedure)
                    .await
                    .map(|_| params.clone())
            }
            #[cfg(feature = "mssql")]
            PoolConnection::Mssql(mssql_client) => {
                mssql::execute_procedure(mssql_client, procedure, params).await
            }
        }
    }
}
