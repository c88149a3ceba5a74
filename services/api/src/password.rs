//! One-way password hashing with Argon2
//!
//! Hashing is deliberately slow, so both operations run on the blocking
//! thread pool instead of the async workers.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(password_hash::Error),

    #[error("Malformed password hash: {0}")]
    MalformedHash(password_hash::Error),

    #[error("Password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash a plaintext password into a PHC string with a fresh random salt
pub async fn hash(plaintext: &str) -> Result<String, PasswordError> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&plaintext)).await?
}

/// `Ok(false)` on a wrong password; `Err` only when `digest` cannot be parsed
pub async fn verify(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    let plaintext = plaintext.to_owned();
    let digest = digest.to_owned();
    tokio::task::spawn_blocking(move || verify_blocking(&plaintext, &digest)).await?
}

fn hash_blocking(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

fn verify_blocking(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(digest).map_err(PasswordError::MalformedHash)?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e)),
    }
}
