use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/routes
/// Full catalog: route groups keyed by group key, with routes and buses.
pub async fn routes_listing(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.catalog.grouped_routes().await?))
}

/// GET /api/passengers
pub async fn passengers(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = page.offset.unwrap_or(0).max(0);

    let passengers = state.bookings.list_passengers(limit, offset).await?;

    Ok(Json(json!({
        "passengers": passengers,
        "limit": limit,
        "offset": offset,
    })))
}
