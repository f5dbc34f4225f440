#![cfg(feature = "sqlite")]

use serde::Deserialize;
use sql_repository::prelude::*;
use tokio::runtime::Runtime;

#[derive(Debug, Deserialize, PartialEq)]
struct Player {
    id: i64,
    name: String,
    score: i64,
}

async fn sqlite_repo(dir: &tempfile::TempDir) -> Result<Repository, RepositoryError> {
    let db_path = dir.path().join("repo.db");
    let config = RepositoryConfig::new()
        .with_connection(Backend::Sqlite, db_path.to_string_lossy().to_string());
    Repository::connect(config).await
}

#[test]
fn batch_insert_query_and_scalar() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::TempDir::new()?;

    rt.block_on(async {
        let repo = sqlite_repo(&dir).await?;
        assert_eq!(repo.default_backend(), Backend::Sqlite);

        repo.try_run_batch(
            "CREATE TABLE players (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score INTEGER NOT NULL);
             CREATE UNIQUE INDEX idx_players_name ON players(name);",
        )
        .await?;

        let rows = repo
            .try_run_command(
                "INSERT INTO players (id, name, score) VALUES (?1, ?2, ?3)",
                &[
                    SqlValue::Int(1),
                    SqlValue::Text("alice".to_string()),
                    SqlValue::Int(42),
                ],
            )
            .await?;
        assert_eq!(rows, 1);

        let outcome = repo
            .run_command(
                "INSERT INTO players (id, name, score) VALUES (?1, ?2, ?3)",
                &[
                    SqlValue::Int(2),
                    SqlValue::Text("bob".to_string()),
                    SqlValue::Int(7),
                ],
            )
            .await;
        assert_eq!(outcome, CommandOutcome::Success);

        let players: Vec<Player> = repo
            .try_run_query("SELECT id, name, score FROM players ORDER BY id", &[])
            .await?;
        assert_eq!(
            players,
            vec![
                Player {
                    id: 1,
                    name: "alice".to_string(),
                    score: 42
                },
                Player {
                    id: 2,
                    name: "bob".to_string(),
                    score: 7
                },
            ]
        );

        let total = repo
            .try_run_scalar("SELECT SUM(score) FROM players", &[])
            .await?;
        assert_eq!(total, Some(SqlValue::Int(49)));

        let nobody = repo
            .try_run_scalar(
                "SELECT score FROM players WHERE name = ?1",
                &[SqlValue::Text("carol".to_string())],
            )
            .await?;
        assert_eq!(nobody, None);

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn unique_violation_and_failure_outcomes() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::TempDir::new()?;

    rt.block_on(async {
        let repo = sqlite_repo(&dir).await?;

        repo.try_run_batch("CREATE TABLE emails (addr TEXT PRIMARY KEY)")
            .await?;

        let first = repo
            .run_command(
                "INSERT INTO emails (addr) VALUES (?1)",
                &[SqlValue::Text("a@example.com".to_string())],
            )
            .await;
        assert_eq!(first, CommandOutcome::Success);

        let duplicate = repo
            .run_command(
                "INSERT INTO emails (addr) VALUES (?1)",
                &[SqlValue::Text("a@example.com".to_string())],
            )
            .await;
        assert_eq!(duplicate, CommandOutcome::UniqueKeyViolation);

        let bad_sql = repo
            .run_command("INSERT INTO no_such_table (x) VALUES (?1)", &[SqlValue::Int(1)])
            .await;
        assert_eq!(bad_sql, CommandOutcome::Failure);

        // the lenient query layer folds failures into empty results
        let rows: Vec<Player> = repo.run_query("SELECT broken FROM nowhere", &[]).await;
        assert!(rows.is_empty());
        let scalar = repo.run_scalar("SELECT broken FROM nowhere", &[]).await;
        assert_eq!(scalar, None);

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn routing_and_argument_errors() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::TempDir::new()?;

    rt.block_on(async {
        let repo = sqlite_repo(&dir).await?;

        let empty = repo.try_run_command("   ", &[]).await;
        assert!(matches!(empty, Err(RepositoryError::ParameterError(_))));

        #[cfg(feature = "postgres")]
        {
            let unconfigured = repo
                .try_run_command_on(Backend::Postgres, "SELECT 1", &[])
                .await;
            assert!(matches!(
                unconfigured,
                Err(RepositoryError::MissingConnectionString(Backend::Postgres))
            ));
        }

        let proc = repo.try_run_procedure("do_thing", &ParamSet::new()).await;
        assert!(matches!(proc, Err(RepositoryError::Unimplemented(_))));

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn stored_procedure_failure_falls_back_to_default() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct ProcTotals {
        total: i64,
        label: String,
    }

    let rt = Runtime::new()?;
    let dir = tempfile::TempDir::new()?;

    rt.block_on(async {
        let repo = sqlite_repo(&dir).await?;

        // SQLite has no stored procedures, so the strict call refuses
        assert!(matches!(
            repo.try_run_stored_procedure::<ProcTotals>("tally", &ParamSet::new())
                .await,
            Err(RepositoryError::Unimplemented(_))
        ));

        // and the lenient wrapper logs and hands back the default value
        let totals: ProcTotals = repo.run_stored_procedure("tally", &ParamSet::new()).await;
        assert_eq!(totals, ProcTotals::default());

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn per_call_connection_override() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::TempDir::new()?;

    rt.block_on(async {
        let repo = sqlite_repo(&dir).await?;
        let other_db = dir.path().join("other.db");
        let target =
            Target::with_connection(Backend::Sqlite, other_db.to_string_lossy().to_string());

        repo.try_run_batch_on(target.clone(), "CREATE TABLE side (n INTEGER)")
            .await?;
        repo.try_run_command_on(
            target.clone(),
            "INSERT INTO side (n) VALUES (?1)",
            &[SqlValue::Int(5)],
        )
        .await?;

        let side = repo
            .try_run_scalar_on(target, "SELECT n FROM side", &[])
            .await?;
        assert_eq!(side, Some(SqlValue::Int(5)));

        // the configured database never saw that table
        let main = repo
            .try_run_select("SELECT name FROM sqlite_master WHERE name = ?1", &[
                SqlValue::Text("side".to_string()),
            ])
            .await?;
        assert!(main.results.is_empty());

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
