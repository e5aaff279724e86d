use axum::extract::State;
use axum::Json;
use elite_domain::booking::booking_code;
use elite_domain::seat::SeatKey;
use elite_domain::trip::TripSchedule;
use elite_gateway::receipts::ReceiptRequest;
use elite_store::booking_repo::{BookingDisplay, NewPassenger};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBookingRequest {
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
    pub price: f64,
    pub unit_price: Option<f64>,
    pub lock_id: String,
    pub paystack_ref: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmBookingResponse {
    pub booking_id: String,
    pub booking_ids: Vec<String>,
    pub passenger_name: String,
    pub route_name: String,
    pub bus_name: String,
    pub seat: String,
    pub seats: Vec<String>,
    pub seat_count: usize,
    pub price: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl ConfirmBookingResponse {
    fn from_display(display: BookingDisplay, duplicate: bool) -> Self {
        Self {
            booking_id: booking_code(display.booking_ids[0]),
            booking_ids: display.booking_ids.iter().map(|id| booking_code(*id)).collect(),
            passenger_name: display.passenger_name,
            route_name: display.route_name,
            bus_name: display.bus_name,
            seat: display.seats.first().cloned().unwrap_or_default(),
            seat_count: display.seats.len(),
            seats: display.seats,
            price: display.total_price,
            phone: display.phone,
            email: display.email,
            status: "confirmed".to_string(),
            receipt_url: display.receipt_url,
            duplicate: duplicate.then_some(true),
        }
    }
}

/// POST /api/booking/confirm
///
/// Finalize a purchase: verify the charge with the processor, prove the
/// caller still owns every seat hold, insert one confirmed booking per
/// seat, consume the holds, then fan out receipt + SMS. Retries with the
/// same reference replay the original confirmation without touching
/// anything.
pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<Json<ConfirmBookingResponse>, ApiError> {
    let reference = req.paystack_ref.trim();
    if reference.is_empty() {
        return Err(ApiError::InputInvalid("paystackRef is required".to_string()));
    }
    if reference.contains(':') {
        // The per-seat ref shape is `<ref>:<seat>`; a colon in the base
        // reference would collide with it.
        return Err(ApiError::InputInvalid(
            "paystackRef must not contain ':'".to_string(),
        ));
    }
    let lock_id = req.lock_id.trim();
    if lock_id.is_empty() {
        return Err(ApiError::InputInvalid("lockId is required".to_string()));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::InputInvalid("passenger name is required".to_string()));
    }

    let trip = state.trips.resolve_active(req.bus_id, req.trip_id).await?;
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

    // Idempotency: a reference that already produced bookings replays the
    // original confirmation. No re-charge, no new rows, no second SMS.
    if let Some(display) = state.bookings.display_by_reference(reference).await? {
        tracing::info!(reference, "replaying confirmation for known reference");
        return Ok(Json(ConfirmBookingResponse::from_display(display, true)));
    }

    let payment = state
        .payments
        .verify(reference)
        .await
        .map_err(|e| ApiError::PaymentVerificationFailed(e.to_string()))?;
    if !payment.is_success() {
        return Err(ApiError::PaymentVerificationFailed(format!(
            "processor reported status {}",
            payment.status
        )));
    }
    if req.price > 0.0 {
        let expected = (req.price * 100.0).round() as i64;
        if expected != payment.amount_minor {
            return Err(ApiError::PaymentAmountMismatch {
                expected,
                actual: payment.amount_minor,
            });
        }
    }

    let lock_ids = state
        .seats
        .owned_lock_ids(req.bus_id, trip.as_ref(), &seats, lock_id)
        .await?;

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

    let per_seat = match req.unit_price {
        Some(p) if p > 0.0 => p,
        _ => req.price / seats.len() as f64,
    };

    insert_all_seats(
        &state,
        req.bus_id,
        trip.as_ref(),
        &seats,
        passenger_id,
        per_seat,
        reference,
    )
    .await?;

    state.seats.delete_locks(&lock_ids).await?;

    if let Some(t) = &trip {
        state.bookings.refresh_available_hint(req.bus_id, t.id).await?;
    }

    emit_receipt_and_sms(&state, reference, trip.as_ref()).await;

    let display = state
        .bookings
        .display_by_reference(reference)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("booking vanished after insert")))?;

    Ok(Json(ConfirmBookingResponse::from_display(display, false)))
}

/// Insert one confirmed booking per seat via conditional inserts. A refusal
/// (someone else confirmed the seat first) compensates by deleting the rows
/// written so far plus the passenger, then surfaces the conflict.
pub(crate) async fn insert_all_seats(
    state: &AppState,
    bus_id: i64,
    trip: Option<&TripSchedule>,
    seats: &[SeatKey],
    passenger_id: i64,
    per_seat: f64,
    reference: &str,
) -> Result<Vec<i64>, ApiError> {
    let mut inserted: Vec<i64> = Vec::with_capacity(seats.len());

    for key in seats {
        let seat_ref = if seats.len() == 1 {
            reference.to_string()
        } else {
            format!("{}:{}", reference, key.canonical())
        };

        let outcome = state
            .bookings
            .insert_confirmed_seat(
                bus_id,
                trip.map(|t| t.id),
                key,
                passenger_id,
                per_seat,
                &seat_ref,
            )
            .await?;

        match outcome {
            Some(id) => inserted.push(id),
            None => {
                for id in &inserted {
                    let _ = state.bookings.delete_booking(*id).await;
                }
                let _ = state.bookings.delete_passenger(passenger_id).await;
                return Err(ApiError::SeatAlreadyBooked(key.canonical()));
            }
        }
    }

    Ok(inserted)
}

/// Best-effort receipt + SMS fan-out. Nothing here may fail the enclosing
/// request; failures are logged and swallowed.
pub(crate) async fn emit_receipt_and_sms(
    state: &AppState,
    reference: &str,
    trip: Option<&TripSchedule>,
) {
    let display = match state.bookings.display_by_reference(reference).await {
        Ok(Some(display)) => display,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(reference, error = %e, "could not load booking for side effects");
            return;
        }
    };

    let code = booking_code(display.booking_ids[0]);

    let receipt = match state
        .receipts
        .generate(&ReceiptRequest {
            booking_code: code.clone(),
            passenger_name: display.passenger_name.clone(),
            email: display.email.clone(),
            phone: display.phone.clone(),
            route_name: display.route_name.clone(),
            bus_name: display.bus_name.clone(),
            seats: display.seats.clone(),
            amount: display.total_price,
            reference: reference.to_string(),
            departure_date: trip.and_then(|t| t.departure_date.clone()),
            departure_time: trip.and_then(|t| t.departure_time.clone()),
        })
        .await
    {
        Ok(doc) => {
            for id in &display.booking_ids {
                if let Err(e) = state
                    .bookings
                    .insert_receipt(*id, &doc.receipt_url, doc.drive_file_id.as_deref())
                    .await
                {
                    tracing::warn!(booking_id = id, error = %e, "failed to persist receipt row");
                }
            }
            Some(doc)
        }
        Err(e) => {
            tracing::warn!(reference, error = %e, "receipt generation failed");
            None
        }
    };

    if let Some(phone) = &display.phone {
        let mut message = format!(
            "Booking {} confirmed. Seats: {}. Amount: GHS {:.2}.",
            code,
            display.seats.join(", "),
            display.total_price
        );
        if let Some(doc) = &receipt {
            message.push_str(&format!(" Receipt: {}", doc.receipt_url));
        }

        if let Err(e) = state.sms.send(phone, &message).await {
            tracing::warn!(reference, error = %e, "sms dispatch failed");
        }
    }
}
