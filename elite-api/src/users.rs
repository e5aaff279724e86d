use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

/// GET /api/user/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<Value> {
    Json(json!({
        "user": {
            "id": user.id,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "phone": user.phone,
            "picture_url": user.picture_url,
            "auth_method": user.auth_method,
            "verified": user.verified,
            "is_admin": state.settings.is_admin(&user.email),
        }
    }))
}

/// GET /api/user/bookings
/// Bookings made under the signed-in user's email address, newest first.
pub async fn bookings(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let bookings = state.bookings.bookings_for_email(&user.email).await?;

    Ok(Json(json!({ "bookings": bookings })))
}
