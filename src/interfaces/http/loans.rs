use super::AppState;
use super::error::ApiError;
use crate::domain::loan::{Loan, NewLoan};
use crate::domain::user::Principal;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

pub async fn list_loans(State(state): State<AppState>) -> Result<Json<Vec<Loan>>, ApiError> {
    Ok(Json(state.loans.list().await?))
}

pub async fn home_loans(State(state): State<AppState>) -> Result<Json<Vec<Loan>>, ApiError> {
    Ok(Json(state.loans.home().await?))
}

pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Loan>, ApiError> {
    Ok(Json(state.loans.get(&id).await?))
}

pub async fn create_loan(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<NewLoan>, JsonRejection>,
) -> Result<(StatusCode, Json<Loan>), ApiError> {
    let Json(loan) = body?;
    let loan = state.loans.publish(&principal, loan).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}
