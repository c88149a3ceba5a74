//! API models for request and response payloads

pub mod status;
pub mod user;

// Re-export for convenience
pub use status::{StatusResponse, StatusSnapshot};
pub use user::{NewUser, UpdateUser, User};
