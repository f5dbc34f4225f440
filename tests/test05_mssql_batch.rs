#![cfg(feature = "mssql")]

use sql_repository::prelude::*;
use tokio::runtime::Runtime;

// Needs a reachable SQL Server; set SQL_REPOSITORY_MSSQL_URL to an ADO
// connection string to run.
fn mssql_url() -> Option<String> {
    std::env::var("SQL_REPOSITORY_MSSQL_URL").ok()
}

#[test]
fn gapped_placeholders_are_rejected_client_side() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;

    rt.block_on(async {
        // pool construction is lazy, so no server is needed here
        let config = RepositoryConfig::new().with_connection(
            Backend::Mssql,
            "server=tcp:localhost,1433;user=sa;password=unused;TrustServerCertificate=true",
        );
        let repo = Repository::connect(config).await?;

        let gapped = repo
            .try_run_command(
                "UPDATE batch_txn_rows SET id = ?1 WHERE id = ?3",
                &[SqlValue::Int(1), SqlValue::Int(2)],
            )
            .await;
        assert!(matches!(gapped, Err(RepositoryError::InvalidSpec(_))));

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn failed_batch_leaves_no_partial_writes() -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = mssql_url() else {
        return Ok(());
    };
    let rt = Runtime::new()?;

    rt.block_on(async {
        let config = RepositoryConfig::new().with_connection(Backend::Mssql, url);
        let repo = Repository::connect(config).await?;

        repo.try_run_batch(
            "IF OBJECT_ID('batch_txn_rows', 'U') IS NOT NULL DROP TABLE batch_txn_rows;
             CREATE TABLE batch_txn_rows (id INT PRIMARY KEY);",
        )
        .await?;

        // second statement fails, so the first insert must roll back
        let failed = repo
            .try_run_batch(
                "INSERT INTO batch_txn_rows (id) VALUES (1);
                 INSERT INTO no_such_table_anywhere (id) VALUES (2);",
            )
            .await;
        assert!(failed.is_err());

        let count = repo
            .try_run_scalar("SELECT COUNT(*) FROM batch_txn_rows", &[])
            .await?;
        assert_eq!(count, Some(SqlValue::Int(0)));

        // a clean batch still commits
        repo.try_run_batch(
            "INSERT INTO batch_txn_rows (id) VALUES (1);
             INSERT INTO batch_txn_rows (id) VALUES (2);",
        )
        .await?;
        let count = repo
            .try_run_scalar("SELECT COUNT(*) FROM batch_txn_rows", &[])
            .await?;
        assert_eq!(count, Some(SqlValue::Int(2)));

        repo.try_run_batch("DROP TABLE batch_txn_rows;").await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
