use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::RepositoryError;
use crate::types::SqlValue;

/// A row from a database query result
///
/// Column names are shared across all rows of a result set via `Arc`, with a
/// name-to-index cache to avoid repeated string comparisons.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: std::sync::Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<SqlValue>,
    #[doc(hidden)]
    column_index_cache: std::sync::Arc<std::collections::HashMap<String, usize>>,
}

impl DbRow {
    #[must_use]
    pub fn new(column_names: std::sync::Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let cache = std::sync::Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<std::collections::HashMap<_, _>>(),
        );

        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name, or None if not found.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }

        // Fall back to linear search
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column name, ignoring case. Useful for engines that
    /// fold unquoted identifiers (Postgres lowercases them).
    #[must_use]
    pub fn get_ignore_case(&self, column_name: &str) -> Option<&SqlValue> {
        if let Some(v) = self.get(column_name) {
            return Some(v);
        }
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Render the row as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut map = JsonMap::with_capacity(self.column_names.len());
        for (name, value) in self.column_names.iter().zip(self.values.iter()) {
            map.insert(name.clone(), sql_value_to_json(value));
        }
        JsonValue::Object(map)
    }

    /// Deserialize the row into a typed struct by column name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingParameter` when the target type names
    /// a field with no matching column, `RepositoryError::ParameterError` for
    /// any other deserialization failure.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, RepositoryError> {
        deserialize_json(self.to_json())
    }
}

/// A result set from a database query
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<DbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
        }
    }

    /// Add a row to the result set
    pub fn add_row(&mut self, row: DbRow) {
        self.results.push(row);
        self.rows_affected += 1;
    }

    /// First column of the first row, if any. This is the scalar-query view
    /// of a result set.
    #[must_use]
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.results.first().and_then(|row| row.get_by_index(0))
    }

    /// Map every row into a typed struct by column name.
    ///
    /// # Errors
    ///
    /// Fails on the first row that does not deserialize into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>, RepositoryError> {
        self.results
            .iter()
            .map(DbRow::to_typed)
            .collect::<Result<Vec<T>, _>>()
    }
}

/// Convert a `SqlValue` to a JSON value for serde-driven row mapping and
/// stored-procedure result extraction.
#[must_use]
pub fn sql_value_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Int(i) => JsonValue::Number(Number::from(*i)),
        SqlValue::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        SqlValue::Text(s) => JsonValue::String(s.clone()),
        SqlValue::Bool(b) => JsonValue::Bool(*b),
        // chrono's serde format, so chrono fields round-trip
        SqlValue::Timestamp(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        SqlValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Uuid(u) => JsonValue::String(u.to_string()),
        SqlValue::Null => JsonValue::Null,
        SqlValue::Json(j) => j.clone(),
        SqlValue::Blob(bytes) => {
            JsonValue::Array(bytes.iter().map(|b| JsonValue::Number(Number::from(*b))).collect())
        }
    }
}

/// Convert a JSON value into a `SqlValue` for parameter-object ingestion.
/// Nested arrays and objects bind as JSON parameters.
#[must_use]
pub fn json_to_sql_value(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Int(i)
            } else {
                SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Json(value.clone()),
    }
}

pub(crate) fn deserialize_json<T: DeserializeOwned>(value: JsonValue) -> Result<T, RepositoryError> {
    serde_json::from_value(value).map_err(|e| {
        let msg = e.to_string();
        if msg.starts_with("missing field") {
            RepositoryError::MissingParameter(msg)
        } else {
            RepositoryError::ParameterError(msg)
        }
    })
}
