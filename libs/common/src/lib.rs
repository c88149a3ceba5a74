//! Common library for the CinemaTab backend
//!
//! This crate provides the data-access layer shared by the services:
//! scoped PostgreSQL connections, their configuration, and the
//! infrastructure error type.

pub mod database;
pub mod error;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{Database, DatabaseConfig, Statement};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let database = Database::new(DatabaseConfig::from_env()?);
///     let result = database
///         .query(Statement::new("SELECT username FROM users WHERE LOWER(username) = LOWER($1)").bind("bernardos"))
///         .await?;
///     println!("{} row(s)", result.row_count);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
