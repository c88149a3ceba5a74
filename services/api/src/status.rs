//! Status reporter: database metadata aggregated into one snapshot

use chrono::Utc;
use common::database::Database;
use common::error::InfrastructureError;
use tracing::debug;

use crate::{error::ApiResult, models::StatusSnapshot};

#[derive(Clone)]
pub struct StatusReporter {
    database: Database,
}

impl StatusReporter {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Any failing query fails the whole snapshot
    pub async fn snapshot(&self) -> ApiResult<StatusSnapshot> {
        let updated_at = Utc::now();

        let database_version = self.database.server_version().await?;
        let max_connections = parse_max_connections(&self.database.max_connections().await?)?;
        let open_connections = self
            .database
            .open_connections(self.database.database_name())
            .await?;

        debug!(%database_version, max_connections, open_connections, "Status snapshot assembled");

        Ok(StatusSnapshot {
            updated_at,
            database_version,
            max_connections,
            open_connections: i64::from(open_connections),
        })
    }
}

/// `SHOW max_connections` answers with text
pub fn parse_max_connections(raw: &str) -> Result<i64, InfrastructureError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| InfrastructureError::Decode(format!("max_connections {raw:?}: {e}")))
}
