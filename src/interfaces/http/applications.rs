use super::AppState;
use super::error::ApiError;
use crate::domain::application::{Application, ApplicationStatus, NewApplication};
use crate::domain::user::Principal;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct Decision {
    pub status: ApplicationStatus,
}

pub async fn submit_application(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<NewApplication>, JsonRejection>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let Json(request) = body?;
    let application = state.applications.submit(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn my_applications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(state.applications.list_mine(&principal).await?))
}

pub async fn list_applications(
    State(state): State<AppState>,
    filter: Result<Query<StatusFilter>, QueryRejection>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.applications.list_all(filter.status).await?))
}

pub async fn decide_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Decision>, JsonRejection>,
) -> Result<Json<Application>, ApiError> {
    let Json(decision) = body?;
    Ok(Json(state.applications.decide(&id, decision.status).await?))
}

pub async fn cancel_application(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(state.applications.cancel(&principal, &id).await?))
}
