//! Schema migrations, applied over one scoped connection

use anyhow::{Context, Result};
use common::database::Database;
use tracing::info;

/// Apply pending migrations from `services/api/migrations`
pub async fn migrate(database: &Database) -> Result<()> {
    let mut conn = database.connect().await?;
    let outcome = sqlx::migrate!("./migrations")
        .run(&mut conn)
        .await
        .context("apply database migrations");
    database.release(conn).await;

    outcome?;
    info!("Database migrations applied");
    Ok(())
}
