use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod models;
mod password;
mod repositories;
mod routes;
mod schema;
mod state;
mod status;
mod validation;

use common::database::Database;
use tokio::net::TcpListener;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting API service");

    let config = AppConfig::from_env()?;
    let database = Database::new(config.database.clone());

    // Check database connectivity
    if database.health_check().await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    schema::migrate(&database).await?;

    let app = routes::create_router(AppState::new(database));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("API service listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
