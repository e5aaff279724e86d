use axum::extract::{Path, Query, State};
use axum::Json;
use elite_domain::seat::SeatKey;
use elite_domain::trip::TripSchedule;
use elite_store::booking_repo::{NewPassenger, UpcomingFilter};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::bookings::{emit_receipt_and_sms, insert_all_seats};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;
const RECENT_TRIPS: i64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusRequest {
    pub name: Option<String>,
    pub route_id: Option<i64>,
    pub plate_number: Option<String>,
    pub capacity: Option<i64>,
    pub available_seats: Option<i64>,
    pub price: Option<f64>,
    pub route_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub route_id: Option<i64>,
    pub bus_id: Option<i64>,
    pub departure_date: Option<String>,
    pub departure_time: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBookingRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nok_name: Option<String>,
    pub nok_phone: Option<String>,
    pub bus_id: i64,
    pub trip_id: Option<i64>,
    #[serde(default)]
    pub seats: Vec<String>,
    pub seat: Option<String>,
    pub price: Option<f64>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingQuery {
    pub route_id: Option<i64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/admin/fleet-options
pub async fn fleet_options(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let routes = state.catalog.list_routes().await?;
    let buses = state.catalog.list_buses().await?;
    let active_trips = state.trips.active_overview().await?;
    let recent_trips = state.trips.recent_inactive(RECENT_TRIPS).await?;

    Ok(Json(json!({
        "routes": routes,
        "buses": buses,
        "active_trips": active_trips,
        "recent_trips": recent_trips,
    })))
}

/// POST /api/admin/buses
pub async fn create_bus(
    State(state): State<AppState>,
    Json(req): Json<CreateBusRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::InputInvalid("Bus name is required".to_string()))?;
    let route_id = req
        .route_id
        .ok_or_else(|| ApiError::InputInvalid("routeId is required".to_string()))?;

    let capacity = req.capacity.unwrap_or(elite_domain::seat::DEFAULT_CAPACITY);
    if capacity <= 0 {
        return Err(ApiError::InputInvalid("capacity must be positive".to_string()));
    }

    let bus = state
        .catalog
        .create_bus(
            route_id,
            name,
            req.plate_number.as_deref(),
            capacity,
            req.available_seats,
            req.price.unwrap_or(0.0),
            req.route_text.as_deref(),
        )
        .await?;

    Ok(Json(json!({ "bus": bus })))
}

/// POST /api/admin/trips
pub async fn create_trip(
    State(state): State<AppState>,
    Json(req): Json<CreateTripRequest>,
) -> Result<Json<Value>, ApiError> {
    let route_id = req
        .route_id
        .ok_or_else(|| ApiError::InputInvalid("routeId is required".to_string()))?;
    let bus_id = req
        .bus_id
        .ok_or_else(|| ApiError::InputInvalid("busId is required".to_string()))?;

    let trip = state
        .trips
        .create(
            route_id,
            bus_id,
            req.departure_date,
            req.departure_time,
            req.price,
        )
        .await?;

    Ok(Json(json!({ "trip": trip })))
}

/// POST /api/admin/trips/:trip_id/end
pub async fn end_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let trip = state.trips.end(trip_id).await?;

    Ok(Json(json!({ "trip": trip })))
}

/// POST /api/admin/manual-booking
///
/// Walk-in and phone sales: the same atomic per-seat insertion as the
/// public confirm, minus any payment. Seats already booked, or actively
/// held by a customer session, are refused.
pub async fn manual_booking(
    State(state): State<AppState>,
    Json(req): Json<ManualBookingRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::InputInvalid("passenger name is required".to_string()));
    }

    let trip: Option<TripSchedule> = state.trips.resolve_active(req.bus_id, req.trip_id).await?;
    let capacity = state.seats.bus_capacity(req.bus_id).await?;

    let mut seat_inputs = req.seats.clone();
    if seat_inputs.is_empty() {
        seat_inputs.extend(req.seat.clone());
    }
    if seat_inputs.is_empty() {
        return Err(ApiError::InputInvalid("at least one seat is required".to_string()));
    }

    let mut seats: Vec<SeatKey> = Vec::with_capacity(seat_inputs.len());
    for raw in &seat_inputs {
        let key =
            SeatKey::parse(raw, capacity).map_err(|e| ApiError::InputInvalid(e.to_string()))?;
        if !seats.contains(&key) {
            seats.push(key);
        }
    }

    for key in &seats {
        if let Some(holder) = state
            .seats
            .active_holder(req.bus_id, trip.as_ref(), key)
            .await?
        {
            tracing::debug!(seat = %key.canonical(), holder = %holder, "manual booking blocked by hold");
            return Err(ApiError::SeatAlreadyLocked(key.canonical()));
        }
    }

    let passenger_id = state
        .bookings
        .create_passenger(&NewPassenger {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email: req.email.clone(),
            phone: req.phone.clone(),
            nok_name: req.nok_name.clone(),
            nok_phone: req.nok_phone.clone(),
        })
        .await?;

    let total = req.price.unwrap_or(0.0);
    let per_seat = match req.unit_price {
        Some(p) if p > 0.0 => p,
        _ => total / seats.len() as f64,
    };

    let reference = format!("manual-{}", Uuid::new_v4().simple());
    insert_all_seats(
        &state,
        req.bus_id,
        trip.as_ref(),
        &seats,
        passenger_id,
        per_seat,
        &reference,
    )
    .await?;

    if let Some(t) = &trip {
        state.bookings.refresh_available_hint(req.bus_id, t.id).await?;
    }

    emit_receipt_and_sms(&state, &reference, trip.as_ref()).await;

    let display = state
        .bookings
        .display_by_reference(&reference)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("booking vanished after insert")))?;

    Ok(Json(json!({
        "booking_id": elite_domain::booking::booking_code(display.booking_ids[0]),
        "booking_ids": display.booking_ids.iter()
            .map(|id| elite_domain::booking::booking_code(*id))
            .collect::<Vec<_>>(),
        "passenger_name": display.passenger_name,
        "seats": display.seats,
        "price": display.total_price,
        "status": "confirmed",
        "receipt_url": display.receipt_url,
        "reference": reference,
    })))
}

/// GET /api/admin/upcoming-bookings
pub async fn upcoming_bookings(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(status) = query.status.as_deref() {
        if !matches!(status, "pending" | "confirmed" | "cancelled") {
            return Err(ApiError::InputInvalid(format!("Unknown status filter: {status}")));
        }
    }

    let filter = UpcomingFilter {
        route_id: query.route_id,
        date_from: query.date_from,
        date_to: query.date_to,
        status: query.status,
        limit: query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset: query.offset.unwrap_or(0).max(0),
    };

    Ok(Json(state.bookings.upcoming(&filter).await?))
}

/// GET /api/admin/dashboard
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.bookings.dashboard().await?))
}
