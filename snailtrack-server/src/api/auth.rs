//! Basic-Auth middleware
//!
//! Wraps the pure credential check from `snailtrack_common::api::auth`.
//! Applied to `/api` routes only; `/health` and `/images` stay public.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use snailtrack_common::api::{check_authorization, ApiAuthError};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Reject requests without valid Basic credentials with a JSON 401
///
/// With no credentials configured every request is rejected, unless auth
/// was explicitly disabled.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match check_authorization(header, &state.auth.mode) {
        Ok(()) => Ok(next.run(request).await),
        Err(e) => {
            match &e {
                ApiAuthError::InvalidCredentials => {
                    warn!(path = %request.uri().path(), "Rejected request with invalid credentials")
                }
                _ => debug!(path = %request.uri().path(), error = %e, "Rejected unauthenticated request"),
            }
            Err(ApiError::Unauthorized(e.to_string()))
        }
    }
}
