use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use elite_domain::user::User;

use crate::error::ApiError;
use crate::state::AppState;

/// The session-backed user a protected handler runs as, injected into
/// request extensions by the middleware below.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::AuthRequired("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::AuthRequired("Malformed Authorization header".to_string()))
}

async fn resolve_user(state: &AppState, req: &Request) -> Result<User, ApiError> {
    let token = bearer_token(req)?;

    state
        .users
        .session_user(token)
        .await?
        .ok_or_else(|| ApiError::AuthRequired("Invalid or expired session".to_string()))
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, &req).await?;
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Admin gate: a valid session AND membership in the configured email
/// allow-list. There is no database-side role to consult.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, &req).await?;

    if !state.settings.is_admin(&user.email) {
        return Err(ApiError::Forbidden("Administrator access required".to_string()));
    }
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
