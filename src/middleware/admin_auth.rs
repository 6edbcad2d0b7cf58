//! Bearer-token authentication for the admin API.
//!
//! The expected token is configured via `CSPLINE_ADMIN_TOKEN` and held as a
//! SHA-256 hash in `AppState`. With no token configured the admin surface
//! answers 401 unconditionally.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::util::{extract_bearer_token, hash_secret};

pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_hash) = state.admin_token_hash.as_deref() else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    if hash_secret(token) != expected_hash {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
