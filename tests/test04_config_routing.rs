#![cfg(all(feature = "sqlite", feature = "postgres"))]

use sql_repository::prelude::*;

#[test]
fn override_wins_over_configured_string() {
    let config = RepositoryConfig::new().with_connection(Backend::Sqlite, "main.db");

    let resolved = config.resolve(Backend::Sqlite, Some("other.db")).unwrap();
    assert_eq!(resolved, "other.db");

    // a blank override falls back to the configured string
    let resolved = config.resolve(Backend::Sqlite, Some("   ")).unwrap();
    assert_eq!(resolved, "main.db");

    let resolved = config.resolve(Backend::Sqlite, None).unwrap();
    assert_eq!(resolved, "main.db");
}

#[test]
fn unconfigured_backend_is_an_error() {
    let config = RepositoryConfig::new().with_connection(Backend::Sqlite, "main.db");

    let err = config.resolve(Backend::Postgres, None).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::MissingConnectionString(Backend::Postgres)
    ));

    // unless the call carries its own connection string
    let resolved = config
        .resolve(Backend::Postgres, Some("host=localhost user=app"))
        .unwrap();
    assert_eq!(resolved, "host=localhost user=app");
}

#[test]
fn default_backend_resolution() {
    // single configured backend is the implicit default
    let config = RepositoryConfig::new().with_connection(Backend::Sqlite, "main.db");
    assert_eq!(config.default_backend().unwrap(), Backend::Sqlite);

    // several backends need an explicit choice
    let config = RepositoryConfig::new()
        .with_connection(Backend::Sqlite, "main.db")
        .with_connection(Backend::Postgres, "host=localhost user=app");
    assert!(matches!(
        config.default_backend(),
        Err(RepositoryError::ConfigError(_))
    ));

    let config = config.with_default_backend(Backend::Postgres);
    assert_eq!(config.default_backend().unwrap(), Backend::Postgres);

    // nothing configured at all
    let config = RepositoryConfig::new();
    assert!(matches!(
        config.default_backend(),
        Err(RepositoryError::ConfigError(_))
    ));
}
