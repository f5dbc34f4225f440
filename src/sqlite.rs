//! SQLite support via `rusqlite` behind `deadpool-sqlite`.
//!
//! Blocking driver work runs on the pool's interact thread.

use deadpool_sqlite::rusqlite;
use deadpool_sqlite::{Config as DeadpoolSqliteConfig, Object, Pool, Runtime};
use rusqlite::types::Value;
use rusqlite::Statement;
use rusqlite::ToSql;

use crate::error::RepositoryError;
use crate::results::{DbRow, ResultSet};
use crate::types::SqlValue;

/// Build a `deadpool-sqlite` pool from a database path (or `file:` URI).
#[allow(clippy::unused_async)]
pub(crate) async fn build_pool(
    connection: &str,
    max_size: usize,
) -> Result<Pool, RepositoryError> {
    let mut cfg = DeadpoolSqliteConfig::new(connection.to_string());
    cfg.pool = Some(deadpool::managed::PoolConfig::new(max_size));

    let pool = cfg.create_pool(Runtime::Tokio1).map_err(|e| {
        RepositoryError::ConnectionError(format!("Failed to create SQLite pool: {e}"))
    })?;
    Ok(pool)
}

/// Bind repository params to SQLite types.
pub fn convert_params(params: &[SqlValue]) -> Result<Vec<Value>, RepositoryError> {
    let mut vec_values = Vec::with_capacity(params.len());
    for p in params {
        let v = match p {
            SqlValue::Int(i) => Value::Integer(*i),
            SqlValue::Float(f) => Value::Real(*f),
            SqlValue::Text(s) => Value::Text(s.to_string()),
            SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
            SqlValue::Timestamp(dt) => {
                let formatted = dt.format("%F %T%.f").to_string();
                Value::Text(formatted)
            }
            SqlValue::Date(d) => Value::Text(d.format("%F").to_string()),
            SqlValue::Uuid(u) => Value::Text(u.to_string()),
            SqlValue::Null => Value::Null,
            SqlValue::Json(jsval) => Value::Text(jsval.to_string()),
            SqlValue::Blob(bytes) => Value::Blob(bytes.to_vec()),
        };
        vec_values.push(v);
    }
    Ok(vec_values)
}

fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, RepositoryError> {
    match row.get_ref(idx) {
        Err(e) => Err(RepositoryError::SqliteError(e)),
        Ok(rusqlite::types::ValueRef::Null) => Ok(SqlValue::Null),
        Ok(rusqlite::types::ValueRef::Integer(i)) => Ok(SqlValue::Int(i)),
        Ok(rusqlite::types::ValueRef::Real(f)) => Ok(SqlValue::Float(f)),
        Ok(rusqlite::types::ValueRef::Text(bytes)) => {
            let s = String::from_utf8_lossy(bytes).into_owned();
            Ok(SqlValue::Text(s))
        }
        Ok(rusqlite::types::ValueRef::Blob(b)) => Ok(SqlValue::Blob(b.to_vec())),
    }
}

/// Run a prepared statement and collect its rows.
pub fn build_result_set(
    stmt: &mut Statement,
    params: &[Value],
) -> Result<ResultSet, RepositoryError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    // Store column names once in the result set
    let column_names_rc = std::sync::Arc::new(column_names);

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut result_set = ResultSet::default();

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(column_names_rc.len());

        for i in 0..column_names_rc.len() {
            row_values.push(sqlite_extract_value(row, i)?);
        }

        result_set.add_row(DbRow::new(column_names_rc.clone(), row_values));
    }

    Ok(result_set)
}

pub async fn execute_batch(sqlite_client: &Object, query: &str) -> Result<(), RepositoryError> {
    let query_owned = query.to_owned();

    sqlite_client
        .interact(move |conn| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            tx.execute_batch(&query_owned)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::Other(format!("Interact error: {e}")))
        .and_then(|res| res.map_err(RepositoryError::SqliteError))
}

pub async fn execute_select(
    sqlite_client: &Object,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, RepositoryError> {
    let query_owned = query.to_owned();
    let params_owned = convert_params(params)?;

    sqlite_client
        .interact(move |conn| -> rusqlite::Result<ResultSet> {
            let mut stmt = conn.prepare(&query_owned)?;

            // RepositoryError implements From<rusqlite::Error>, so unwrap the
            // driver error back out for the interact closure's result type.
            build_result_set(&mut stmt, &params_owned).map_err(|e| {
                if let RepositoryError::SqliteError(sqlite_err) = e {
                    sqlite_err
                } else {
                    rusqlite::Error::InvalidParameterName(format!("{e:?}"))
                }
            })
        })
        .await
        .map_err(|e| RepositoryError::Other(format!("Interact error: {e}")))
        .and_then(|res| res.map_err(RepositoryError::SqliteError))
}

pub async fn execute_dml(
    sqlite_client: &Object,
    query: &str,
    params: &[SqlValue],
) -> Result<usize, RepositoryError> {
    let query_owned = query.to_owned();
    let params_owned = convert_params(params)?;

    sqlite_client
        .interact(move |conn| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            let param_refs: Vec<&dyn ToSql> =
                params_owned.iter().map(|v| v as &dyn ToSql).collect();
            let rows = {
                let mut stmt = tx.prepare(&query_owned)?;
                stmt.execute(&param_refs[..])?
            };
            tx.commit()?;

            Ok(rows)
        })
        .await
        .map_err(|e| RepositoryError::Other(format!("Interact error: {e}")))
        .and_then(|res| res.map_err(RepositoryError::SqliteError))
}

/// SQLite has no stored procedures.
pub async fn execute_procedure(
    _sqlite_client: &Object,
    procedure: &str,
) -> Result<ResultSet, RepositoryError> {
    Err(RepositoryError::Unimplemented(format!(
        "SQLite has no stored procedures (requested '{procedure}')"
    )))
}
