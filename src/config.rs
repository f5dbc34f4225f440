use std::collections::HashMap;

use crate::error::RepositoryError;
use crate::types::Backend;

/// Default maximum connections per backend pool.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Per-backend connection configuration for a [`crate::repository::Repository`].
///
/// Each backend takes the connection-string form its driver understands: an
/// ADO-style string for SQL Server, a URL or keyword string for PostgreSQL,
/// and a filesystem path (or `file:` URI) for SQLite.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let config = RepositoryConfig::new()
///     .with_connection(Backend::Sqlite, "/tmp/app.db")
///     .with_default_backend(Backend::Sqlite);
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    connections: HashMap<Backend, String>,
    default_backend: Option<Backend>,
    pool_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            default_backend: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RepositoryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default connection string for a backend.
    #[must_use]
    pub fn with_connection(mut self, backend: Backend, connection: impl Into<String>) -> Self {
        self.connections.insert(backend, connection.into());
        self
    }

    /// Pick the backend used by calls that do not name one.
    #[must_use]
    pub fn with_default_backend(mut self, backend: Backend) -> Self {
        self.default_backend = Some(backend);
        self
    }

    /// Cap the connections each backend pool may hold.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// The configured connection string for a backend, if any.
    #[must_use]
    pub fn connection_for(&self, backend: Backend) -> Option<&str> {
        self.connections.get(&backend).map(String::as_str)
    }

    /// Backends with a configured connection string.
    pub fn configured_backends(&self) -> impl Iterator<Item = Backend> + '_ {
        self.connections.keys().copied()
    }

    /// Resolve the connection string for a call: a non-empty per-call
    /// override wins, then the configured default for the backend.
    ///
    /// # Errors
    ///
    /// `RepositoryError::MissingConnectionString` when neither is available.
    pub fn resolve<'a>(
        &'a self,
        backend: Backend,
        override_connection: Option<&'a str>,
    ) -> Result<&'a str, RepositoryError> {
        if let Some(conn) = override_connection {
            if !conn.trim().is_empty() {
                return Ok(conn);
            }
        }
        self.connection_for(backend)
            .ok_or(RepositoryError::MissingConnectionString(backend))
    }

    /// The backend used when a call names none: the explicitly configured
    /// default, else the single configured backend.
    ///
    /// # Errors
    ///
    /// `RepositoryError::ConfigError` when no default can be determined.
    pub fn default_backend(&self) -> Result<Backend, RepositoryError> {
        if let Some(backend) = self.default_backend {
            return Ok(backend);
        }
        let mut backends = self.connections.keys();
        match (backends.next(), backends.next()) {
            (Some(&backend), None) => Ok(backend),
            (None, _) => Err(RepositoryError::ConfigError(
                "no backend configured".to_string(),
            )),
            (Some(_), Some(_)) => Err(RepositoryError::ConfigError(
                "multiple backends configured; set an explicit default backend".to_string(),
            )),
        }
    }
}
