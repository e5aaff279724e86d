pub mod auth;

use axum::http::{Method, StatusCode};
use axum::{extract::Request, extract::State, middleware::Next, response::Response};

use crate::error::ApiError;
use crate::state::AppState;

/// The wire contract answers CORS preflights with 204. The cors layer
/// replies 200 on its own, so this sits outside it and rewrites the status
/// of the empty preflight reply; OPTIONS requests that fell through to the
/// router (no preflight) keep their status.
pub async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;

    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Runs the one-shot schema bootstrap before any handler touches the store.
/// Concurrent first requests wait on the same latch; a failed bootstrap
/// rewinds it so the next request retries.
pub async fn ensure_schema(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state
        .db
        .ensure_schema()
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(next.run(req).await)
}
