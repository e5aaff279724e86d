use axum::extract::{Path, Query, State};
use axum::Json;
use elite_domain::lock::{SeatLockGrant, SeatMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapQuery {
    pub trip_id: Option<i64>,
    pub lock_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSeatRequest {
    pub seat: Option<String>,
    pub trip_id: Option<i64>,
    pub lock_id: Option<String>,
}

/// GET /api/bus/:bus_id/seats
pub async fn seat_map(
    State(state): State<AppState>,
    Path(bus_id): Path<i64>,
    Query(query): Query<SeatMapQuery>,
) -> Result<Json<SeatMap>, ApiError> {
    let trip = state.trips.resolve_active(bus_id, query.trip_id).await?;
    let map = state
        .seats
        .seat_map(bus_id, trip.as_ref(), query.lock_id.as_deref())
        .await?;

    Ok(Json(map))
}

/// POST /api/bus/:bus_id/lock-seat
/// Take or refresh a 5-minute hold. Without a lockId in the body a fresh
/// lock session is minted and returned.
pub async fn lock_seat(
    State(state): State<AppState>,
    Path(bus_id): Path<i64>,
    Json(req): Json<LockSeatRequest>,
) -> Result<Json<SeatLockGrant>, ApiError> {
    let seat = req
        .seat
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InputInvalid("seat is required".to_string()))?;

    let trip = state.trips.resolve_active(bus_id, req.trip_id).await?;
    let grant = state
        .seats
        .acquire(bus_id, trip.as_ref(), seat, req.lock_id)
        .await?;

    Ok(Json(grant))
}

/// POST /api/bus/:bus_id/unlock-seat
pub async fn unlock_seat(
    State(state): State<AppState>,
    Path(bus_id): Path<i64>,
    Json(req): Json<LockSeatRequest>,
) -> Result<Json<Value>, ApiError> {
    let seat = req
        .seat
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InputInvalid("seat is required".to_string()))?;
    let lock_id = req
        .lock_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InputInvalid("lockId is required".to_string()))?;

    let trip = state.trips.resolve_active(bus_id, req.trip_id).await?;
    let key = state
        .seats
        .release(bus_id, trip.as_ref(), seat, lock_id)
        .await?;

    Ok(Json(json!({
        "unlocked": true,
        "trip_id": trip.map(|t| t.id),
        "seat": key.canonical(),
    })))
}
