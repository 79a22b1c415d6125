//! Users API handlers.
//!
//! Each handler binds its inputs, makes one repository call with the
//! request context, and maps the outcome through [`ApiError`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::context::RequestContext;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::storage::User;

/// Wire projection of a user.
///
/// Every field is optional on input; an absent id decodes as the nil UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModel {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<User> for UserModel {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest)
}

pub async fn healthcheck() -> StatusCode {
    StatusCode::OK
}

pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    // Decoded regardless of Content-Type.
    let user: UserModel = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?;
    state
        .repository
        .create(&ctx, user.id, &user.first_name, &user.last_name)
        .await
        .map_err(|e| ApiError::storage(e, state.expose_error_details))?;
    Ok(StatusCode::OK)
}

pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<UserModel>>, ApiError> {
    let users = state
        .repository
        .list(&ctx)
        .await
        .map_err(|e| ApiError::storage(e, state.expose_error_details))?;
    Ok(Json(users.into_iter().map(UserModel::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<Json<UserModel>, ApiError> {
    let id = parse_id(&raw_id)?;
    let user = state
        .repository
        .get(&ctx, id)
        .await
        .map_err(|e| ApiError::storage(e, state.expose_error_details))?;
    user.map(|u| Json(u.into())).ok_or(ApiError::NotFound)
}

pub async fn delete_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&raw_id)?;
    state
        .repository
        .delete(&ctx, id)
        .await
        .map_err(|e| ApiError::storage(e, state.expose_error_details))?;
    Ok(Json(serde_json::Value::Null))
}

/// Prometheus exposition of the process metrics.
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
