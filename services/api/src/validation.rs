//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::{
    error::{ApiError, ApiResult},
    models::{NewUser, UpdateUser},
};

const USERNAME_MAX_CHARS: usize = 30;
const EMAIL_MAX_CHARS: usize = 254;
const PASSWORD_MAX_CHARS: usize = 128;

/// Validate username
pub fn validate_username(username: &str) -> ApiResult<()> {
    if username.trim().is_empty() {
        return Err(ApiError::validation(
            "O username é obrigatório.",
            "Informe um username para realizar esta operação.",
        ));
    }

    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(ApiError::validation(
            format!("O username deve ter no máximo {USERNAME_MAX_CHARS} caracteres."),
            "Utilize um username mais curto.",
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> ApiResult<()> {
    if email.trim().is_empty() {
        return Err(ApiError::validation(
            "O email é obrigatório.",
            "Informe um email para realizar esta operação.",
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if email.chars().count() > EMAIL_MAX_CHARS || !regex.is_match(email) {
        return Err(ApiError::validation(
            "O email informado não é válido.",
            "Verifique se o email está digitado corretamente.",
        ));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.trim().is_empty() {
        return Err(ApiError::validation(
            "A senha é obrigatória.",
            "Informe uma senha para realizar esta operação.",
        ));
    }

    if password.chars().count() > PASSWORD_MAX_CHARS {
        return Err(ApiError::validation(
            format!("A senha deve ter no máximo {PASSWORD_MAX_CHARS} caracteres."),
            "Utilize uma senha mais curta.",
        ));
    }

    Ok(())
}

pub fn validate_new_user(new_user: &NewUser) -> ApiResult<()> {
    validate_username(&new_user.username)?;
    validate_email(&new_user.email)?;
    validate_password(&new_user.password)
}

/// Only the supplied fields are checked
pub fn validate_update(update: &UpdateUser) -> ApiResult<()> {
    if let Some(username) = &update.username {
        validate_username(username)?;
    }
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if let Some(password) = &update.password {
        validate_password(password)?;
    }
    Ok(())
}
