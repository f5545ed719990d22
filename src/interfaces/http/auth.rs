//! Bearer authentication and role gates.
//!
//! [`authenticate`] wraps every non-public route and leaves the verified [`Principal`] in the
//! request extensions. The role gates run after it on the manager and admin sub-routers.

use super::AppState;
use super::error::ApiError;
use crate::domain::user::{Principal, Role};
use crate::error::AuthError;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = bearer_token(request.headers())?;
    let principal = state.verifier.verify(bearer).await.map_err(|err| {
        debug!(error = %err, path = %request.uri().path(), "rejected bearer credential");
        ApiError::from(err)
    })?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

pub async fn require_manager(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_role(&state, request, next, &[Role::Manager, Role::Admin]).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_role(&state, request, next, &[Role::Admin]).await
}

async fn require_role(
    state: &AppState,
    request: Request,
    next: Next,
    allowed: &[Role],
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(AuthError::MissingCredential)?;
    let role = state.access.role_of(&principal).await?;
    if !allowed.contains(&role) {
        warn!(email = %principal.email, %role, path = %request.uri().path(), "role check failed");
        return Err(ApiError::forbidden(format!(
            "the {role} role cannot access this resource"
        )));
    }
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingCredential));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }
}
