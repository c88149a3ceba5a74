//! Application state shared across handlers

use common::database::Database;

use crate::{repositories::UserRepository, status::StatusReporter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repository: UserRepository,
    pub status_reporter: StatusReporter,
}

impl AppState {
    pub fn new(database: Database) -> Self {
        Self {
            user_repository: UserRepository::new(database.clone()),
            status_reporter: StatusReporter::new(database),
        }
    }
}
