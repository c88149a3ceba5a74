//! Status snapshot and its serialized shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the database dependency
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub updated_at: DateTime<Utc>,
    pub database_version: String,
    pub max_connections: i64,
    pub open_connections: i64,
}

/// Response body for `GET /api/v1/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub updated_at: DateTime<Utc>,
    pub dependencies: Dependencies,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    pub database: DatabaseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub version: String,
    pub max_connections: i64,
    pub opened_connections: i64,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(snapshot: StatusSnapshot) -> Self {
        StatusResponse {
            updated_at: snapshot.updated_at,
            dependencies: Dependencies {
                database: DatabaseStatus {
                    version: snapshot.database_version,
                    max_connections: snapshot.max_connections,
                    opened_connections: snapshot.open_connections,
                },
            },
        }
    }
}
