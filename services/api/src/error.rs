//! Domain error model for the API service
//!
//! Every error exposes the same four public facts: `name`, `message`,
//! `action` and `status_code`. Route handlers turn them into the flat JSON
//! body without looking at the variant.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::InfrastructureError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

const INTERNAL_MESSAGE: &str = "Um erro interno não esperado aconteceu.";
const INTERNAL_ACTION: &str = "Entre em contato com o suporte.";

/// Which write path raised a uniqueness conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// Column guarded by case-insensitive uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    pub fn label(self) -> &'static str {
        match self {
            UniqueField::Username => "username",
            UniqueField::Email => "email",
        }
    }
}

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Entity lookup found nothing
    #[error("{message}")]
    NotFound { message: String, action: String },

    /// Input shape or uniqueness rule violated
    #[error("{message}")]
    Validation { message: String, action: String },

    /// Anything else. The cause stays internal.
    #[error("Internal server error: {cause}")]
    InternalServerError {
        #[source]
        cause: anyhow::Error,
    },
}

/// Serialized form of an [`ApiError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
    pub action: String,
    pub status_code: u16,
}

impl ApiError {
    pub fn validation(message: impl Into<String>, action: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            action: action.into(),
        }
    }

    pub fn internal(cause: impl Into<anyhow::Error>) -> Self {
        ApiError::InternalServerError {
            cause: cause.into(),
        }
    }

    pub fn username_not_found() -> Self {
        ApiError::NotFound {
            message: "O username informado não foi encontrado no sistema.".to_string(),
            action: "Verifique se o username está digitado corretamente.".to_string(),
        }
    }

    /// Conflict on a unique field. The create path's action has no final
    /// period; clients match on these strings.
    pub fn conflict(field: UniqueField, operation: Operation) -> Self {
        let label = field.label();
        let action = match operation {
            Operation::Create => format!("Utilize outro {label} para realizar o cadastro"),
            Operation::Update => format!("Utilize outro {label} para realizar esta operação."),
        };

        ApiError::validation(format!("O {label} informado já está sendo utilizado."), action)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NotFoundError",
            ApiError::Validation { .. } => "ValidationError",
            ApiError::InternalServerError { .. } => "InternalServerError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound { message, .. } | ApiError::Validation { message, .. } => message.as_str(),
            ApiError::InternalServerError { .. } => INTERNAL_MESSAGE,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            ApiError::NotFound { action, .. } | ApiError::Validation { action, .. } => action.as_str(),
            ApiError::InternalServerError { .. } => INTERNAL_ACTION,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            name: self.name().to_string(),
            message: self.message().to_string(),
            action: self.action().to_string(),
            status_code: self.status_code().as_u16(),
        }
    }
}

impl From<InfrastructureError> for ApiError {
    fn from(err: InfrastructureError) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalServerError { cause } = &self {
            error!(error = ?cause, "Request failed with an internal error");
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
