use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use elite_domain::user::User;
use elite_store::password::{hash_password, verify_password, PasswordMatch};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Claims the client decoded out of the identity provider's JWT. The
/// provider signature is not re-checked server-side; trust rides on the
/// processor calling convention.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthRequest {
    pub mode: Option<String>,
    pub google_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

fn user_payload(state: &AppState, user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "phone": user.phone,
        "picture_url": user.picture_url,
        "auth_method": user.auth_method,
        "is_admin": state.settings.is_admin(&user.email),
    })
}

async fn session_response(state: &AppState, user: &User) -> Result<Json<Value>, ApiError> {
    let session = state.users.create_session(user.id).await?;

    Ok(Json(json!({
        "token": session.token,
        "expires_at": session.expires_at,
        "user": user_payload(state, user),
    })))
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(ApiError::InputInvalid("A valid email is required".to_string()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::InputInvalid(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::InputInvalid("First and last name are required".to_string()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::InputInvalid("Email is already registered".to_string()));
    }

    let user = state
        .users
        .create_email_user(
            &email,
            &hash_password(&req.password),
            req.first_name.trim(),
            req.last_name.trim(),
            req.phone.as_deref(),
        )
        .await?;

    if let Err(e) = state.users.create_seed_passenger(&user).await {
        tracing::warn!(user_id = user.id, error = %e, "failed to seed passenger row");
    }

    session_response(&state, &user).await
}

/// POST /api/auth/signin
pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .users
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(|| ApiError::AuthRequired("Invalid email or password".to_string()))?;

    let Some(stored) = user.password_hash.as_deref() else {
        return Err(ApiError::InputInvalid(
            "This account signs in with Google".to_string(),
        ));
    };

    match verify_password(&req.password, stored) {
        PasswordMatch::Match => {}
        PasswordMatch::LegacyMatch => {
            // Upgrade the legacy row now that we hold the clear text.
            if let Err(e) = state
                .users
                .update_password_hash(user.id, &hash_password(&req.password))
                .await
            {
                tracing::warn!(user_id = user.id, error = %e, "legacy password upgrade failed");
            }
        }
        PasswordMatch::Mismatch => {
            return Err(ApiError::AuthRequired("Invalid email or password".to_string()));
        }
    }

    session_response(&state, &user).await
}

/// POST /api/auth/google
pub async fn google(
    State(state): State<AppState>,
    Json(req): Json<GoogleAuthRequest>,
) -> Result<Json<Value>, ApiError> {
    let mode = req.mode.as_deref().unwrap_or("signin");
    if mode != "signin" && mode != "signup" {
        return Err(ApiError::InputInvalid(format!("Unknown auth mode: {mode}")));
    }
    if req.google_id.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::InputInvalid(
            "googleId and a valid email are required".to_string(),
        ));
    }

    // Subject first, then email: an email-password account presenting the
    // same address gets the federated identity attached.
    let mut user = state.users.find_by_google_id(&req.google_id).await?;
    if user.is_none() {
        if let Some(existing) = state.users.find_by_email(&req.email).await? {
            state
                .users
                .attach_google_id(existing.id, &req.google_id, req.picture.as_deref())
                .await?;
            user = state.users.get(existing.id).await?;
        }
    }

    if let Some(user) = user {
        return session_response(&state, &user).await;
    }

    if mode == "signin" {
        return Err(ApiError::NotFound(
            "No account found for this Google identity".to_string(),
        ));
    }

    let phone = req
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::InputInvalid("Phone number is required to sign up".to_string()))?;

    let user = state
        .users
        .create_google_user(
            req.google_id.trim(),
            req.email.trim(),
            req.first_name.as_deref().unwrap_or(""),
            req.last_name.as_deref().unwrap_or(""),
            Some(phone),
            req.picture.as_deref(),
        )
        .await?;

    if let Err(e) = state.users.create_seed_passenger(&user).await {
        tracing::warn!(user_id = user.id, error = %e, "failed to seed passenger row");
    }

    session_response(&state, &user).await
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// POST /api/auth/verify
/// Accepts the token either as a bearer header or in the body.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<VerifyRequest>>,
) -> Result<Json<Value>, ApiError> {
    let token = header_token(&headers)
        .or(body.and_then(|Json(req)| req.token))
        .ok_or_else(|| ApiError::AuthRequired("Missing token".to_string()))?;

    let user = state
        .users
        .session_user(&token)
        .await?
        .ok_or_else(|| ApiError::AuthRequired("Invalid or expired session".to_string()))?;

    Ok(Json(json!({
        "valid": true,
        "user": user_payload(&state, &user),
    })))
}

/// POST /api/auth/signout
/// Opaque tokens make revocation a row delete.
pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token =
        header_token(&headers).ok_or_else(|| ApiError::AuthRequired("Missing token".to_string()))?;

    state.users.delete_session(&token).await?;

    Ok(Json(json!({ "signed_out": true })))
}
