//! The repository: per-backend routing, checked operations, and the
//! log-and-classify wrapping layer.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::executor::DatabaseExecutor;
use crate::params::ParamSet;
use crate::pool::{BackendPool, PoolConnection};
use crate::results::ResultSet;
use crate::translate::{
    translate_placeholders, validate_sequential_placeholders, PlaceholderStyle,
};
use crate::types::{Backend, SqlValue};

/// Tri-state outcome of a wrapped write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failure,
    UniqueKeyViolation,
}

impl CommandOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Where a call should run: a backend plus an optional connection-string
/// override for that one call.
#[derive(Debug, Clone)]
pub struct Target {
    backend: Backend,
    connection: Option<String>,
}

impl Target {
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            connection: None,
        }
    }

    /// Route to a backend through an ad-hoc connection string instead of the
    /// configured one.
    #[must_use]
    pub fn with_connection(backend: Backend, connection: impl Into<String>) -> Self {
        Self {
            backend,
            connection: Some(connection.into()),
        }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl From<Backend> for Target {
    fn from(backend: Backend) -> Self {
        Target::new(backend)
    }
}

/// Driver-specific unique-key violation message fragments.
fn is_unique_violation(backend: Backend, err: &RepositoryError) -> bool {
    let text = err.to_string();
    let pattern = match backend {
        #[cfg(feature = "mssql")]
        Backend::Mssql => "Violation of UNIQUE KEY constraint",
        #[cfg(feature = "postgres")]
        Backend::Postgres => "duplicate key value violates unique constraint",
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => "UNIQUE constraint failed",
    };
    text.contains(pattern)
}

/// An async repository over one pool per configured backend.
///
/// Checked `try_run_*` operations return explicit `Result`s; the `run_*`
/// layer logs failures and folds them into lenient defaults the way callers
/// of a base repository usually want.
#[derive(Debug)]
pub struct Repository {
    config: RepositoryConfig,
    pools: HashMap<Backend, BackendPool>,
    default_backend: Backend,
}

impl Repository {
    /// Build one pool per configured backend.
    ///
    /// # Errors
    ///
    /// `RepositoryError::ConfigError` when no default backend can be
    /// determined, plus any pool-construction failure.
    pub async fn connect(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        let default_backend = config.default_backend()?;

        let mut pools = HashMap::new();
        for backend in config.configured_backends() {
            let connection = config.resolve(backend, None)?;
            let pool = BackendPool::build(backend, connection, config.pool_size()).await?;
            pools.insert(backend, pool);
        }

        Ok(Self {
            config,
            pools,
            default_backend,
        })
    }

    /// The backend used when a call names none.
    #[must_use]
    pub fn default_backend(&self) -> Backend {
        self.default_backend
    }

    /// The configuration this repository was built from.
    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn default_target(&self) -> Target {
        Target::new(self.default_backend)
    }

    /// Check out a connection for a target. An override connection string
    /// builds a transient single-connection pool for that call.
    async fn checkout(&self, target: &Target) -> Result<PoolConnection, RepositoryError> {
        match target.connection.as_deref() {
            Some(connection) if !connection.trim().is_empty() => {
                let pool = BackendPool::build(target.backend, connection, 1).await?;
                pool.get_connection().await
            }
            _ => match self.pools.get(&target.backend) {
                Some(pool) => pool.get_connection().await,
                None => Err(RepositoryError::MissingConnectionString(target.backend)),
            },
        }
    }

    fn prepare_sql<'a>(sql: &'a str, backend: Backend) -> Result<Cow<'a, str>, RepositoryError> {
        if sql.trim().is_empty() {
            return Err(RepositoryError::ParameterError(
                "SQL text must not be empty".to_string(),
            ));
        }
        let style = backend.placeholder_style();
        // Tiberius binds positionally, so reject gapped numbering up front
        // instead of letting the server misassign arguments.
        if style == PlaceholderStyle::Mssql {
            validate_sequential_placeholders(sql)?;
        }
        Ok(translate_placeholders(sql, style))
    }

    // ---- checked core ----

    /// Run a DML statement on the default backend and report affected rows.
    ///
    /// # Errors
    ///
    /// Empty SQL fails with `RepositoryError::ParameterError`; everything else
    /// passes through from the driver.
    pub async fn try_run_command(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<usize, RepositoryError> {
        self.try_run_command_on(self.default_target(), sql, params)
            .await
    }

    /// Run a DML statement on an explicit target.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_command`].
    pub async fn try_run_command_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<usize, RepositoryError> {
        let target = target.into();
        let sql = Self::prepare_sql(sql, target.backend)?;
        let mut conn = self.checkout(&target).await?;
        conn.execute_dml(&sql, params).await
    }

    /// Run a multi-statement batch transactionally on the default backend.
    ///
    /// # Errors
    ///
    /// Empty SQL fails with `RepositoryError::ParameterError`; everything else
    /// passes through from the driver.
    pub async fn try_run_batch(&self, sql: &str) -> Result<(), RepositoryError> {
        self.try_run_batch_on(self.default_target(), sql).await
    }

    /// Run a multi-statement batch transactionally on an explicit target.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_batch`].
    pub async fn try_run_batch_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
    ) -> Result<(), RepositoryError> {
        let target = target.into();
        if sql.trim().is_empty() {
            return Err(RepositoryError::ParameterError(
                "SQL text must not be empty".to_string(),
            ));
        }
        let mut conn = self.checkout(&target).await?;
        conn.execute_batch(sql).await
    }

    /// Run a SELECT on the default backend and collect its rows.
    ///
    /// # Errors
    ///
    /// Empty SQL fails with `RepositoryError::ParameterError`; everything else
    /// passes through from the driver.
    pub async fn try_run_select(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, RepositoryError> {
        self.try_run_select_on(self.default_target(), sql, params)
            .await
    }

    /// Run a SELECT on an explicit target.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_select`].
    pub async fn try_run_select_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, RepositoryError> {
        let target = target.into();
        let sql = Self::prepare_sql(sql, target.backend)?;
        let mut conn = self.checkout(&target).await?;
        conn.execute_select(&sql, params).await
    }

    /// Run a SELECT on the default backend and map every row to `T`.
    ///
    /// # Errors
    ///
    /// Execution errors pass through; a row that cannot deserialize into `T`
    /// fails with `RepositoryError::MissingParameter` (absent field) or
    /// `RepositoryError::ParameterError`.
    pub async fn try_run_query<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<T>, RepositoryError> {
        self.try_run_query_on(self.default_target(), sql, params)
            .await
    }

    /// Run a SELECT on an explicit target and map every row to `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_query`].
    pub async fn try_run_query_on<T: DeserializeOwned>(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<T>, RepositoryError> {
        let result_set = self.try_run_select_on(target, sql, params).await?;
        result_set.into_typed()
    }

    /// Run a SELECT on the default backend and return the first column of the
    /// first row.
    ///
    /// # Errors
    ///
    /// Empty SQL fails with `RepositoryError::ParameterError`; everything else
    /// passes through from the driver.
    pub async fn try_run_scalar(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlValue>, RepositoryError> {
        self.try_run_scalar_on(self.default_target(), sql, params)
            .await
    }

    /// Run a SELECT on an explicit target and return the first column of the
    /// first row.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_scalar`].
    pub async fn try_run_scalar_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqlValue>, RepositoryError> {
        let target = target.into();
        let sql = Self::prepare_sql(sql, target.backend)?;
        let mut conn = self.checkout(&target).await?;
        conn.execute_scalar(&sql, params).await
    }

    /// Invoke a stored procedure on the default backend. The returned set
    /// carries the original bindings with output and return slots populated.
    ///
    /// # Errors
    ///
    /// `RepositoryError::InvalidSpec` for an unusable parameter set,
    /// `RepositoryError::Unimplemented` on SQLite, or any driver error.
    pub async fn try_run_procedure(
        &self,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<ParamSet, RepositoryError> {
        self.try_run_procedure_on(self.default_target(), procedure, params)
            .await
    }

    /// Invoke a stored procedure on an explicit target.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_procedure`].
    pub async fn try_run_procedure_on(
        &self,
        target: impl Into<Target>,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<ParamSet, RepositoryError> {
        let target = target.into();
        if procedure.trim().is_empty() {
            return Err(RepositoryError::ParameterError(
                "procedure name must not be empty".to_string(),
            ));
        }
        let mut conn = self.checkout(&target).await?;
        conn.execute_procedure(procedure, params).await
    }

    /// Invoke a stored procedure and extract its output and return values
    /// into `T` by parameter name.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_procedure`], plus
    /// `RepositoryError::MissingParameter` when `T` names a parameter the set
    /// does not carry.
    pub async fn try_run_stored_procedure<T: DeserializeOwned>(
        &self,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<T, RepositoryError> {
        self.try_run_stored_procedure_on(self.default_target(), procedure, params)
            .await
    }

    /// Invoke a stored procedure on an explicit target and extract its
    /// results into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Repository::try_run_stored_procedure`].
    pub async fn try_run_stored_procedure_on<T: DeserializeOwned>(
        &self,
        target: impl Into<Target>,
        procedure: &str,
        params: &ParamSet,
    ) -> Result<T, RepositoryError> {
        let resolved = self.try_run_procedure_on(target, procedure, params).await?;
        resolved.extract()
    }

    // ---- wrapping layer ----

    /// Run a DML statement, logging any failure and folding it into the
    /// tri-state outcome. Unique-key violations are recognized from the
    /// driver's error text.
    pub async fn run_command(&self, sql: &str, params: &[SqlValue]) -> CommandOutcome {
        self.run_command_on(self.default_target(), sql, params).await
    }

    /// Run a DML statement on an explicit target, logging any failure and
    /// folding it into the tri-state outcome.
    pub async fn run_command_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> CommandOutcome {
        let target = target.into();
        match self.try_run_command_on(target.clone(), sql, params).await {
            Ok(rows) => {
                tracing::debug!(backend = %target.backend(), rows, "command completed");
                CommandOutcome::Success
            }
            Err(e) if is_unique_violation(target.backend(), &e) => {
                tracing::warn!(backend = %target.backend(), "unique key violation: {e}");
                CommandOutcome::UniqueKeyViolation
            }
            Err(e) => {
                tracing::error!(backend = %target.backend(), "command failed: {e}");
                CommandOutcome::Failure
            }
        }
    }

    /// Run a typed query, logging any failure and returning an empty `Vec`.
    pub async fn run_query<T: DeserializeOwned>(&self, sql: &str, params: &[SqlValue]) -> Vec<T> {
        self.run_query_on(self.default_target(), sql, params).await
    }

    /// Run a typed query on an explicit target, logging any failure and
    /// returning an empty `Vec`.
    pub async fn run_query_on<T: DeserializeOwned>(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Vec<T> {
        let target = target.into();
        match self.try_run_query_on(target.clone(), sql, params).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(backend = %target.backend(), "query failed: {e}");
                Vec::new()
            }
        }
    }

    /// Run a scalar query, logging any failure and returning `None`.
    pub async fn run_scalar(&self, sql: &str, params: &[SqlValue]) -> Option<SqlValue> {
        self.run_scalar_on(self.default_target(), sql, params).await
    }

    /// Run a scalar query on an explicit target, logging any failure and
    /// returning `None`.
    pub async fn run_scalar_on(
        &self,
        target: impl Into<Target>,
        sql: &str,
        params: &[SqlValue],
    ) -> Option<SqlValue> {
        let target = target.into();
        match self.try_run_scalar_on(target.clone(), sql, params).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(backend = %target.backend(), "scalar query failed: {e}");
                None
            }
        }
    }

    /// Invoke a stored procedure and extract its results, logging any failure
    /// and returning `T::default()`.
    pub async fn run_stored_procedure<T: DeserializeOwned + Default>(
        &self,
        procedure: &str,
        params: &ParamSet,
    ) -> T {
        self.run_stored_procedure_on(self.default_target(), procedure, params)
            .await
    }

    /// Invoke a stored procedure on an explicit target, logging any failure
    /// and returning `T::default()`.
    pub async fn run_stored_procedure_on<T: DeserializeOwned + Default>(
        &self,
        target: impl Into<Target>,
        procedure: &str,
        params: &ParamSet,
    ) -> T {
        let target = target.into();
        match self
            .try_run_stored_procedure_on(target.clone(), procedure, params)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(
                    backend = %target.backend(),
                    procedure,
                    "stored procedure failed: {e}"
                );
                T::default()
            }
        }
    }
}
