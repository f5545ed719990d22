use super::AppState;
use super::error::ApiError;
use crate::domain::user::{Principal, Role, User};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
pub struct RegisterUser {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub async fn register_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<RegisterUser>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(body) = body?;
    Ok(Json(state.access.register(&principal, &body.name).await?))
}

pub async fn user_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<RoleResponse>, ApiError> {
    let role = state.access.role_of(&principal).await?;
    Ok(Json(RoleResponse { role }))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.access.list().await?))
}

pub async fn set_user_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
    body: Result<Json<RoleUpdate>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.access.set_role(&email, update.role).await?))
}
