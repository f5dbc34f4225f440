//! PostgreSQL support via `tokio-postgres` behind `deadpool-postgres`.

use std::error::Error;
use std::str::FromStr;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Transaction};
use tokio_postgres::{
    types::{to_sql_checked, IsNull, ToSql, Type},
    NoTls, Statement,
};
use tokio_util::bytes;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::params::ParamSet;
use crate::proc;
use crate::results::{DbRow, ResultSet};
use crate::types::SqlValue;

/// Build a `deadpool-postgres` pool from a libpq-style connection string.
pub(crate) fn build_pool(connection: &str, max_size: usize) -> Result<Pool, RepositoryError> {
    let pg_config = tokio_postgres::Config::from_str(connection)
        .map_err(|e| RepositoryError::ConfigError(format!("PostgreSQL connection string: {e}")))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let manager = Manager::from_config(pg_config, NoTls, mgr_config);

    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| {
            RepositoryError::ConnectionError(format!("Failed to create PostgreSQL pool: {e}"))
        })
}

/// Container for Postgres parameters with lifetime tracking
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Convert from a slice of `SqlValue` to Postgres parameters
    pub fn convert(params: &'a [SqlValue]) -> Result<Params<'a>, RepositoryError> {
        let references: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        Ok(Params { references })
    }

    /// Get a reference to the underlying parameter array
    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Int(i) => (*i).to_sql(ty, out),
            SqlValue::Float(f) => (*f).to_sql(ty, out),
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bool(b) => (*b).to_sql(ty, out),
            SqlValue::Timestamp(dt) => dt.to_sql(ty, out),
            SqlValue::Date(d) => d.to_sql(ty, out),
            SqlValue::Uuid(u) => u.to_sql(ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Json(jsval) => jsval.to_sql(ty, out),
            SqlValue::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::CHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::UUID
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

/// Build a result set from a Postgres query execution
pub async fn build_result_set(
    stmt: &Statement,
    params: &[&(dyn ToSql + Sync)],
    transaction: &Transaction<'_>,
) -> Result<ResultSet, RepositoryError> {
    let rows = transaction.query(stmt, params).await?;

    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    let mut result_set = ResultSet::with_capacity(rows.len());
    // Store column names once in the result set
    let column_names_rc = std::sync::Arc::new(column_names);

    for row in rows {
        let mut row_values = Vec::with_capacity(column_names_rc.len());

        for i in 0..column_names_rc.len() {
            row_values.push(postgres_extract_value(&row, i)?);
        }

        result_set.add_row(DbRow::new(column_names_rc.clone(), row_values));
    }

    Ok(result_set)
}

/// Extracts a `SqlValue` from a `tokio_postgres` row at the given index.
fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<SqlValue, RepositoryError> {
    let type_info = row.columns()[idx].type_();

    match type_info.name() {
        "int2" | "int4" | "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Int))
        }
        "float4" | "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Bool))
        }
        "timestamp" | "timestamptz" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Timestamp))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Date))
        }
        "uuid" => {
            let val: Option<Uuid> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Uuid))
        }
        "json" | "jsonb" => {
            let val: Option<Value> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Json))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Blob))
        }
        // Everything else reads back as text
        _ => {
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Text))
        }
    }
}

/// Execute a batch of SQL statements for Postgres
///
/// # Errors
/// Returns errors from transaction operations or batch execution.
pub async fn execute_batch(pg_client: &mut Object, query: &str) -> Result<(), RepositoryError> {
    let tx = pg_client.transaction().await?;
    tx.batch_execute(query).await?;
    tx.commit().await?;

    Ok(())
}

/// Execute a SELECT query with parameters
///
/// # Errors
/// Returns errors from parameter conversion, transaction operations, query preparation, or result set building.
pub async fn execute_select(
    pg_client: &mut Object,
    query: &str,
    params: &[SqlValue],
) -> Result<ResultSet, RepositoryError> {
    let params = Params::convert(params)?;
    let tx = pg_client.transaction().await?;
    let stmt = tx.prepare(query).await?;
    let result_set = build_result_set(&stmt, params.as_refs(), &tx).await?;
    tx.commit().await?;
    Ok(result_set)
}

/// Execute a DML query (INSERT, UPDATE, DELETE) with parameters
///
/// # Errors
/// Returns errors from parameter conversion, transaction operations, or query execution.
pub async fn execute_dml(
    pg_client: &mut Object,
    query: &str,
    params: &[SqlValue],
) -> Result<usize, RepositoryError> {
    let params = Params::convert(params)?;
    let tx = pg_client.transaction().await?;

    let stmt = tx.prepare(query).await?;
    let rows = tx.execute(&stmt, params.as_refs()).await?;
    tx.commit().await?;

    Ok(usize::try_from(rows).unwrap_or(usize::MAX))
}

/// Call a stored procedure via `CALL`, writing any INOUT results back into
/// the returned parameter set.
///
/// # Errors
/// `RepositoryError::InvalidSpec` for an unusable parameter set, plus any
/// driver error from the `CALL` itself.
pub async fn execute_procedure(
    pg_client: &mut Object,
    procedure: &str,
    params: &ParamSet,
) -> Result<ParamSet, RepositoryError> {
    let command = proc::render_call(procedure, params)?;
    let mut resolved = params.clone();

    let bind = Params::convert(&command.bind_values)?;
    let tx = pg_client.transaction().await?;
    let stmt = tx.prepare(&command.sql).await?;

    if command.has_outputs {
        let result_set = build_result_set(&stmt, bind.as_refs(), &tx).await?;
        tx.commit().await?;

        let row = result_set.results.first().ok_or_else(|| {
            RepositoryError::ExecutionError(format!(
                "procedure '{procedure}' returned no output row"
            ))
        })?;
        proc::apply_output_row(&mut resolved, row);
    } else {
        tx.execute(&stmt, bind.as_refs()).await?;
        tx.commit().await?;
    }

    Ok(resolved)
}
