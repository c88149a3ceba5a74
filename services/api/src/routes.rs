//! API service routes

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::de::DeserializeOwned;

use crate::{
    error::{ApiError, ApiResult},
    models::{NewUser, StatusResponse, UpdateUser, User},
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/:username", get(get_user).patch(patch_user))
        .with_state(state)
}

/// Status endpoint
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let snapshot = state.status_reporter.snapshot().await?;
    Ok(Json(snapshot.into()))
}

/// Create a new user
pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let payload: NewUser = parse_body(&body)?;
    let user = state.user_repository.create(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by username
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state.user_repository.find_one_by_username(&username).await?;
    Ok(Json(user))
}

/// Update some fields of a user. An empty body changes nothing but
/// `updated_at`.
pub async fn patch_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Bytes,
) -> ApiResult<Json<User>> {
    let update: UpdateUser = if body.iter().all(u8::is_ascii_whitespace) {
        UpdateUser::default()
    } else {
        parse_body(&body)?
    };

    let user = state.user_repository.patch(&username, update).await?;
    Ok(Json(user))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::info!(error = %e, "Rejected request body");
        ApiError::validation(
            "O corpo da requisição é inválido.",
            "Envie um JSON com os campos esperados.",
        )
    })
}
