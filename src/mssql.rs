//! SQL Server support via `tiberius` behind a deadpool manager.

use std::fmt;

use deadpool::managed::{Manager, Metrics, Object, Pool, RecycleError};
use futures_util::TryStreamExt;
use tiberius::{Client, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::params::ParamSet;
use crate::proc;
use crate::results::{DbRow, ResultSet};
use crate::types::SqlValue;

/// Type alias for a SQL Server client over a compat TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Type alias for the SQL Server connection pool.
pub type MssqlPool = Pool<MssqlManager>;

/// Manager for SQL Server connections (used with deadpool).
#[derive(Clone)]
pub struct MssqlManager {
    config: tiberius::Config,
    addr: String,
}

impl fmt::Debug for MssqlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlManager")
            .field("addr", &self.addr)
            .finish()
    }
}

impl Manager for MssqlManager {
    type Type = MssqlClient;
    type Error = tiberius::error::Error;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let config = self.config.clone();

        let tcp = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: format!("TCP connection error: {e}"),
            })?;

        let tcp = tcp.compat_write();
        Client::connect(config, tcp).await
    }

    async fn recycle(
        &self,
        client: &mut Self::Type,
        _metrics: &Metrics,
    ) -> Result<(), RecycleError<Self::Error>> {
        // Check the connection is still usable before handing it out again
        let query = Query::new("SELECT 1");
        match query.query(client).await {
            Ok(_) => Ok(()),
            Err(e) => Err(RecycleError::Backend(e)),
        }
    }
}

/// Build a deadpool-managed SQL Server pool from an ADO.NET connection string.
pub(crate) fn build_pool(connection: &str, max_size: usize) -> Result<MssqlPool, RepositoryError> {
    let config = tiberius::Config::from_ado_string(connection)
        .map_err(|e| RepositoryError::ConfigError(format!("SQL Server connection string: {e}")))?;

    let manager = MssqlManager {
        addr: config.get_addr(),
        config,
    };

    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| {
            RepositoryError::ConnectionError(format!("Failed to create SQL Server pool: {e}"))
        })
}

/// Bind parameters directly to the query for SQL Server.
/// Returns a query builder with parameters already bound.
pub fn bind_query_params<'a>(query: &'a str, params: &[SqlValue]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            SqlValue::Int(i) => query_builder.bind(*i),
            SqlValue::Float(f) => query_builder.bind(*f),
            SqlValue::Text(s) => query_builder.bind(s.clone()),
            SqlValue::Bool(b) => query_builder.bind(*b),
            SqlValue::Timestamp(dt) => query_builder.bind(*dt),
            SqlValue::Date(d) => query_builder.bind(*d),
            SqlValue::Uuid(u) => query_builder.bind(*u),
            SqlValue::Null => query_builder.bind(Option::<String>::None),
            SqlValue::Json(jsval) => query_builder.bind(jsval.to_string()),
            SqlValue::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}

/// Build a result set from a SQL Server query execution.
pub async fn build_result_set(
    client: &mut MssqlClient,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, RepositoryError> {
    let query_builder = bind_query_params(query, params);

    let mut stream = query_builder
        .query(client)
        .await
        .map_err(|e| RepositoryError::ExecutionError(format!("SQL Server query error: {e}")))?;

    let columns_opt = stream.columns().await.map_err(|e| {
        RepositoryError::ExecutionError(format!("SQL Server column fetch error: {e}"))
    })?;

    let columns = columns_opt.ok_or_else(|| {
        RepositoryError::ExecutionError("No columns returned from query".to_string())
    })?;

    let column_names: Vec<String> = columns.iter().map(|col| col.name().to_string()).collect();

    let mut result_set = ResultSet::with_capacity(10);
    // Store column names once in the result set
    let column_names_rc = std::sync::Arc::new(column_names);

    let mut rows_stream = stream.into_row_stream();
    while let Some(row) = rows_stream.try_next().await.map_err(|e| {
        RepositoryError::ExecutionError(format!("SQL Server row fetch error: {e}"))
    })? {
        result_set.add_row(row_to_db_row(&row, &column_names_rc)?);
    }

    Ok(result_set)
}

fn row_to_db_row(
    row: &tiberius::Row,
    column_names: &std::sync::Arc<Vec<String>>,
) -> Result<DbRow, RepositoryError> {
    let mut row_values = Vec::with_capacity(column_names.len());
    for i in 0..column_names.len() {
        row_values.push(extract_value(row, i).unwrap_or(SqlValue::Null));
    }
    Ok(DbRow::new(column_names.clone(), row_values))
}

/// Extract a value from a row at a specific index.
///
/// The Tiberius row API keys decoding on the requested Rust type, so this
/// tries each supported type in turn.
fn extract_value(row: &tiberius::Row, idx: usize) -> Option<SqlValue> {
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return Some(SqlValue::Int(i64::from(val)));
    }

    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return Some(SqlValue::Int(val));
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return Some(SqlValue::Float(f64::from(val)));
    }

    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return Some(SqlValue::Float(val));
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return Some(SqlValue::Bool(val));
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Some(SqlValue::Timestamp(val));
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDate, _>(idx) {
        return Some(SqlValue::Date(val));
    }

    if let Ok(Some(val)) = row.try_get::<Uuid, _>(idx) {
        return Some(SqlValue::Uuid(val));
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return Some(SqlValue::Text(val.to_string()));
    }

    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return Some(SqlValue::Blob(val.to_vec()));
    }

    None
}

/// Execute a batch of SQL statements for SQL Server within a transaction.
///
/// `XACT_ABORT` makes a mid-batch runtime error abort the whole batch, so the
/// rollback covers every statement.
///
/// # Errors
///
/// Returns `RepositoryError::ExecutionError` if execution fails; the
/// transaction is rolled back first.
pub async fn execute_batch(
    mssql_client: &mut Object<MssqlManager>,
    query: &str,
) -> Result<(), RepositoryError> {
    let client = &mut **mssql_client;

    Query::new("SET XACT_ABORT ON; BEGIN TRANSACTION;")
        .execute(client)
        .await
        .map_err(|e| {
            RepositoryError::ExecutionError(format!("SQL Server transaction begin error: {e}"))
        })?;

    let result = Query::new(query).execute(client).await;

    match result {
        Ok(_) => {
            Query::new("COMMIT TRANSACTION;")
                .execute(client)
                .await
                .map_err(|e| {
                    RepositoryError::ExecutionError(format!(
                        "SQL Server transaction commit error: {e}"
                    ))
                })?;
            Ok(())
        }
        Err(e) => {
            // XACT_ABORT may already have rolled back; a second rollback on a
            // dead transaction is a no-op worth ignoring.
            let _ = Query::new("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;")
                .execute(client)
                .await;
            Err(RepositoryError::ExecutionError(format!(
                "SQL Server batch execution error: {e}"
            )))
        }
    }
}

/// Execute a SELECT query with parameters.
///
/// # Errors
///
/// Returns `RepositoryError::ExecutionError` if execution or result processing fails.
pub async fn execute_select(
    mssql_client: &mut Object<MssqlManager>,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, RepositoryError> {
    let client = &mut **mssql_client;

    build_result_set(client, query, params).await
}

/// Execute a DML query (INSERT, UPDATE, DELETE) with parameters.
///
/// # Errors
///
/// Returns `RepositoryError::ExecutionError` if execution fails or rows affected cannot be converted.
pub async fn execute_dml(
    mssql_client: &mut Object<MssqlManager>,
    query: &str,
    params: &[SqlValue],
) -> Result<usize, RepositoryError> {
    let client = &mut **mssql_client;

    let query_builder = bind_query_params(query, params);

    let exec_result = query_builder.execute(client).await.map_err(|e| {
        RepositoryError::ExecutionError(format!("SQL Server DML execution error: {e}"))
    })?;

    let rows_affected: u64 = exec_result.rows_affected().iter().sum();

    usize::try_from(rows_affected)
        .map_err(|e| RepositoryError::ExecutionError(format!("Invalid rows affected count: {e}")))
}

/// Execute a stored procedure via a T-SQL `EXEC` batch, writing any OUTPUT
/// and RETURN results back into the returned parameter set.
///
/// # Errors
///
/// `RepositoryError::InvalidSpec` for an unusable parameter set, plus any
/// driver error from the batch itself.
pub async fn execute_procedure(
    mssql_client: &mut Object<MssqlManager>,
    procedure: &str,
    params: &ParamSet,
) -> Result<ParamSet, RepositoryError> {
    let command = proc::render_exec_batch(procedure, params)?;
    let mut resolved = params.clone();

    let client = &mut **mssql_client;
    let query_builder = bind_query_params(&command.sql, &command.bind_values);

    if command.has_outputs {
        let stream = query_builder.query(client).await.map_err(|e| {
            RepositoryError::ExecutionError(format!("SQL Server procedure error: {e}"))
        })?;

        // The procedure may emit its own result sets before the trailing
        // SELECT that carries the OUTPUT and RETURN values.
        let results = stream.into_results().await.map_err(|e| {
            RepositoryError::ExecutionError(format!("SQL Server procedure fetch error: {e}"))
        })?;

        let output_row = results
            .iter()
            .rev()
            .find_map(|set| set.last())
            .ok_or_else(|| {
                RepositoryError::ExecutionError(format!(
                    "procedure '{procedure}' returned no output row"
                ))
            })?;

        let column_names: Vec<String> = output_row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let row = row_to_db_row(output_row, &std::sync::Arc::new(column_names))?;
        proc::apply_output_row(&mut resolved, &row);
    } else {
        query_builder.execute(client).await.map_err(|e| {
            RepositoryError::ExecutionError(format!("SQL Server procedure error: {e}"))
        })?;
    }

    Ok(resolved)
}
