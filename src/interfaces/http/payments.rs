//! Checkout and settlement endpoints.
//!
//! Paths and response shapes are kept compatible with the web front end.

use super::AppState;
use super::error::ApiError;
use crate::application::reconciler::{CheckoutInitiation, ReconciliationOutcome};
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::PaymentLink;
use crate::domain::user::Principal;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub amount: Decimal,
    pub loan_title: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// The application being paid for.
    pub loan_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub transaction_id: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(body) = body?;
    if let Some(email) = body.customer_email.as_deref()
        && !email.trim().eq_ignore_ascii_case(&principal.email)
    {
        return Err(ApiError::forbidden(
            "customerEmail does not match the signed-in user",
        ));
    }

    let url = state
        .reconciler
        .initiate_checkout(CheckoutInitiation {
            application_id: body.loan_id,
            loan_title: body.loan_title,
            amount: body.amount,
            customer_email: principal.email,
        })
        .await?;
    Ok(Json(CheckoutResponse { url }))
}

pub async fn payment_success(
    State(state): State<AppState>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    if query.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id is required"));
    }
    let outcome = state.reconciler.reconcile(query.session_id.trim()).await?;
    Ok(Json(outcome_body(&outcome)))
}

pub async fn payment_info(
    State(state): State<AppState>,
    query: Result<Query<TransactionQuery>, QueryRejection>,
) -> Result<Json<Option<PaymentRecord>>, ApiError> {
    let Query(query) = query?;
    let record = state
        .reconciler
        .lookup_payment_by_transaction(&query.transaction_id)
        .await?;
    Ok(Json(record))
}

pub async fn my_payments(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    Ok(Json(state.reconciler.payments_of(&principal.email).await?))
}

/// Renders an outcome in the write-result shape the front end reads.
fn outcome_body(outcome: &ReconciliationOutcome) -> Value {
    match outcome {
        ReconciliationOutcome::AlreadyRecorded { record } => json!({
            "message": "Payment already recorded",
            "transactionId": record.transaction_id,
        }),
        ReconciliationOutcome::NotPaid { payment_status, .. } => json!({
            "success": false,
            "message": "Payment not completed",
            "paymentStatus": payment_status,
        }),
        ReconciliationOutcome::Recorded {
            application,
            payment,
        } => {
            let (matched, modified) = match application {
                PaymentLink::Updated => (1, 1),
                PaymentLink::AlreadyLinked | PaymentLink::Conflict { .. } => (1, 0),
                PaymentLink::NotFound => (0, 0),
            };
            json!({
                "success": true,
                "modifiedApplication": {
                    "acknowledged": true,
                    "matchedCount": matched,
                    "modifiedCount": modified,
                },
                "paymentInfo": {
                    "acknowledged": true,
                    "insertedId": payment.id,
                },
                "transactionId": payment.transaction_id,
            })
        }
    }
}
