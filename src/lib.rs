//! Async base-repository layer over SQL Server, PostgreSQL, and SQLite.
//!
//! One [`Repository`] routes each call to a configured backend, binds
//! parameters through a unified [`SqlValue`] model, and exposes both a
//! checked `try_run_*` API and a lenient `run_*` API that logs failures and
//! folds unique-key violations into [`CommandOutcome`]. Stored procedures
//! bind through an ordered, spec-validated [`ParamSet`] whose output and
//! return slots can be extracted into any `serde` type.
//!
//! ```rust,no_run
//! use sql_repository::prelude::*;
//!
//! # async fn demo() -> Result<(), RepositoryError> {
//! let config = RepositoryConfig::new().with_connection(Backend::Sqlite, "app.db");
//! let repo = Repository::connect(config).await?;
//!
//! repo.try_run_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
//!     .await?;
//! let outcome = repo
//!     .run_command(
//!         "INSERT INTO users (id, name) VALUES (?1, ?2)",
//!         &[SqlValue::Int(1), SqlValue::Text("alice".into())],
//!     )
//!     .await;
//! assert!(outcome.is_success());
//! # Ok(()) }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod params;
pub mod pool;
pub mod proc;
pub mod repository;
pub mod results;
pub mod translate;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::RepositoryConfig;
pub use error::RepositoryError;
pub use executor::DatabaseExecutor;
pub use params::{BoundParam, ParamDirection, ParamSet, ParamSpec, SqlKind};
pub use pool::{BackendPool, PoolConnection};
pub use proc::ProcCommand;
pub use repository::{CommandOutcome, Repository, Target};
pub use results::{DbRow, ResultSet};
pub use translate::{translate_placeholders, validate_sequential_placeholders, PlaceholderStyle};
pub use types::{Backend, SqlValue};

/// Convenient imports for common functionality.
///
/// This module re-exports the most commonly used types and functions
/// to make it easier to get started with the library.
pub mod prelude {
    pub use crate::config::RepositoryConfig;
    pub use crate::error::RepositoryError;
    pub use crate::executor::DatabaseExecutor;
    pub use crate::params::{BoundParam, ParamDirection, ParamSet, ParamSpec, SqlKind};
    pub use crate::pool::{BackendPool, PoolConnection};
    pub use crate::repository::{CommandOutcome, Repository, Target};
    pub use crate::results::{DbRow, ResultSet};
    pub use crate::translate::{translate_placeholders, PlaceholderStyle};
    pub use crate::types::{Backend, SqlValue};

    #[cfg(feature = "postgres")]
    pub use crate::postgres::Params as PostgresParams;

    #[cfg(feature = "mssql")]
    pub use crate::mssql::{MssqlClient, MssqlManager, MssqlPool};
}
