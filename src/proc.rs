//! Stored-procedure call rendering.
//!
//! Drivers expose no direct OUTPUT/return-value binding, so procedure calls
//! are rendered as small SQL texts per backend:
//!
//! * SQL Server: a T-SQL batch that declares one variable per output/return
//!   slot, runs `EXEC`, then selects the variables back as a result row.
//! * PostgreSQL: `CALL proc($1..$N)` with NULL bound for output slots; the
//!   CALL's result row carries the populated INOUT values.
//!
//! Parameter and procedure names are interpolated into SQL text, so they are
//! validated against strict identifier patterns first.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::RepositoryError;
use crate::params::{ParamDirection, ParamSet, SqlKind};
use crate::results::DbRow;
use crate::types::SqlValue;

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    // optionally schema-qualified: proc, schema.proc
    static ref PROC_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap();
}

/// A rendered procedure call: SQL text plus the values to bind, in order.
#[derive(Debug, Clone)]
pub struct ProcCommand {
    /// The SQL text to execute
    pub sql: String,
    /// Values to bind positionally
    pub bind_values: Vec<SqlValue>,
    /// Whether the call produces a result row of output/return values
    pub has_outputs: bool,
}

pub(crate) fn validate_procedure_name(name: &str) -> Result<(), RepositoryError> {
    if PROC_RE.is_match(name) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidSpec(format!(
            "invalid procedure name '{name}'"
        )))
    }
}

pub(crate) fn validate_param_name(name: &str) -> Result<(), RepositoryError> {
    if IDENT_RE.is_match(name) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidSpec(format!(
            "invalid parameter name '{name}'"
        )))
    }
}

fn validate(procedure: &str, params: &ParamSet) -> Result<(), RepositoryError> {
    validate_procedure_name(procedure)?;
    for p in params {
        validate_param_name(&p.name)?;
    }
    Ok(())
}

/// T-SQL type declaration for a directed parameter.
fn mssql_type_decl(kind: SqlKind, length: Option<usize>) -> String {
    match kind {
        SqlKind::VarChar => format!("NVARCHAR({})", length.unwrap_or(1)),
        SqlKind::Char => format!("NCHAR({})", length.unwrap_or(1)),
        SqlKind::AnsiVarChar => format!("VARCHAR({})", length.unwrap_or(1)),
        SqlKind::AnsiChar => format!("CHAR({})", length.unwrap_or(1)),
        SqlKind::Int => "INT".to_string(),
        SqlKind::BigInt => "BIGINT".to_string(),
        SqlKind::DateTime => "DATETIME2".to_string(),
        SqlKind::Date => "DATE".to_string(),
        SqlKind::Uuid => "UNIQUEIDENTIFIER".to_string(),
    }
}

/// Render a SQL Server procedure call as an EXEC batch.
///
/// Inputs bind positionally as `@P1..@PN`; each output/return slot becomes a
/// declared variable selected back by parameter name in a final result row.
///
/// # Errors
///
/// `RepositoryError::InvalidSpec` for unparseable identifiers or directed
/// parameters with no declared kind.
pub fn render_exec_batch(procedure: &str, params: &ParamSet) -> Result<ProcCommand, RepositoryError> {
    validate(procedure, params)?;

    let mut declares = Vec::new();
    let mut args = Vec::new();
    let mut selects = Vec::new();
    let mut bind_values = Vec::new();
    let mut return_name: Option<String> = None;

    for p in params {
        match p.direction {
            ParamDirection::Input => {
                bind_values.push(p.value.clone().unwrap_or(SqlValue::Null));
                args.push(format!("@{} = @P{}", p.name, bind_values.len()));
            }
            ParamDirection::Output => {
                let kind = directed_kind(&p.name, p.kind)?;
                declares.push(format!(
                    "DECLARE @{} {};",
                    p.name,
                    mssql_type_decl(kind, p.length)
                ));
                args.push(format!("@{0} = @{0} OUTPUT", p.name));
                selects.push(format!("@{0} AS [{0}]", p.name));
            }
            ParamDirection::Return => {
                if return_name.is_some() {
                    return Err(RepositoryError::InvalidSpec(format!(
                        "parameter '{}': a procedure has a single return value",
                        p.name
                    )));
                }
                let kind = directed_kind(&p.name, p.kind)?;
                declares.push(format!(
                    "DECLARE @{} {};",
                    p.name,
                    mssql_type_decl(kind, p.length)
                ));
                selects.push(format!("@{0} AS [{0}]", p.name));
                return_name = Some(p.name.clone());
            }
        }
    }

    let mut sql = String::new();
    for d in &declares {
        sql.push_str(d);
        sql.push('\n');
    }
    match &return_name {
        Some(ret) => sql.push_str(&format!("EXEC @{ret} = {procedure}")),
        None => sql.push_str(&format!("EXEC {procedure}")),
    }
    if !args.is_empty() {
        sql.push(' ');
        sql.push_str(&args.join(", "));
    }
    sql.push(';');
    let has_outputs = !selects.is_empty();
    if has_outputs {
        sql.push('\n');
        sql.push_str("SELECT ");
        sql.push_str(&selects.join(", "));
        sql.push(';');
    }

    Ok(ProcCommand {
        sql,
        bind_values,
        has_outputs,
    })
}

/// Render a PostgreSQL procedure call.
///
/// Every parameter is passed positionally; output slots bind as NULL and come
/// back in the CALL's result row. Return-direction parameters have no
/// PostgreSQL counterpart.
///
/// # Errors
///
/// `RepositoryError::Unimplemented` for return-direction parameters,
/// `RepositoryError::InvalidSpec` for unparseable identifiers.
pub fn render_call(procedure: &str, params: &ParamSet) -> Result<ProcCommand, RepositoryError> {
    validate(procedure, params)?;

    let mut bind_values = Vec::new();
    let mut has_outputs = false;
    for p in params {
        match p.direction {
            ParamDirection::Input => {
                bind_values.push(p.value.clone().unwrap_or(SqlValue::Null));
            }
            ParamDirection::Output => {
                bind_values.push(SqlValue::Null);
                has_outputs = true;
            }
            ParamDirection::Return => {
                return Err(RepositoryError::Unimplemented(format!(
                    "parameter '{}': PostgreSQL procedures have no return value; use an output parameter",
                    p.name
                )));
            }
        }
    }

    let placeholders: Vec<String> = (1..=bind_values.len()).map(|n| format!("${n}")).collect();
    let sql = format!("CALL {procedure}({})", placeholders.join(", "));

    Ok(ProcCommand {
        sql,
        bind_values,
        has_outputs,
    })
}

fn directed_kind(name: &str, kind: Option<SqlKind>) -> Result<SqlKind, RepositoryError> {
    kind.ok_or_else(|| {
        RepositoryError::InvalidSpec(format!(
            "parameter '{name}': output/return parameters need a declared kind"
        ))
    })
}

/// Copy a result row of output values back into the set's directed slots.
/// Columns match by name first, falling back to output order.
pub(crate) fn apply_output_row(params: &mut ParamSet, row: &DbRow) {
    let directed: Vec<String> = params
        .iter()
        .filter(|p| p.direction != ParamDirection::Input)
        .map(|p| p.name.clone())
        .collect();

    for (pos, name) in directed.iter().enumerate() {
        let value = row
            .get_ignore_case(name)
            .or_else(|| row.get_by_index(pos))
            .cloned();
        if let Some(value) = value {
            params.set_value(name, value);
        }
    }
}
