//! Integration tests for the infrastructure components
//!
//! These tests need a reachable PostgreSQL configured through the
//! `POSTGRES_*` variables. Run them with `cargo test -- --ignored`.

use common::database::{Database, DatabaseConfig, Statement};

/// Test that verifies PostgreSQL is reachable through scoped connections
/// and that the metadata queries return usable values
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let database = Database::new(DatabaseConfig::from_env()?);

    assert!(database.health_check().await?, "Database health check failed");

    // Bound values come back untouched and in order
    let result = database
        .query(
            Statement::new("SELECT $1::text AS name, $2::bigint AS amount")
                .bind("O'Reilly; DROP TABLE users;")
                .bind(42_i64),
        )
        .await?;
    assert_eq!(result.row_count, 1);
    assert_eq!(result.scalar::<String>("name")?, "O'Reilly; DROP TABLE users;");
    assert_eq!(result.scalar::<i64>("amount")?, 42);

    let version = database.server_version().await?;
    assert!(!version.is_empty(), "server_version should not be empty");

    let max_connections = database.max_connections().await?;
    assert!(max_connections.parse::<i64>().is_ok());

    // The counting statement's own connection is part of the count
    let open = database.open_connections(database.database_name()).await?;
    assert!(open >= 1, "expected at least the counting connection");

    Ok(())
}

/// A failing statement is reported as an infrastructure error and does not
/// leave its connection behind
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_failed_statement_releases_connection() -> Result<(), Box<dyn std::error::Error>> {
    let database = Database::new(DatabaseConfig::from_env()?);
    let before = database.open_connections(database.database_name()).await?;

    for _ in 0..5 {
        let err = database.query("SELECT * FROM missing_table;").await;
        assert!(err.is_err());
    }

    let after = database.open_connections(database.database_name()).await?;
    assert!(after < before + 5, "connections leaked: before={before} after={after}");
    Ok(())
}
