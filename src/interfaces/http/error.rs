use crate::error::{AuthError, ReconcileError, ServiceError, StoreError};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An error response: a status code and a `{ error, message }` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ValidationError", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, kind = self.kind, message = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.kind,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        let status = match &err {
            ReconcileError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ReconcileError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ReconcileError::MalformedSession(_) => StatusCode::BAD_GATEWAY,
            ReconcileError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ReconcileError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NotFound", message),
            ServiceError::Forbidden(_) => Self::forbidden(message),
            ServiceError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "InvalidTransition", message)
            }
            ServiceError::Validation(_) => Self::bad_request(message),
            ServiceError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => {
                Self::new(StatusCode::CONFLICT, "Duplicate", err.to_string())
            }
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "StoreUnavailable",
                err.to_string(),
            ),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
