use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use elite_gateway::signature;
use serde_json::{json, Value};

use crate::bookings::emit_receipt_and_sms;
use crate::error::ApiError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// POST /api/paystack/webhook
///
/// The processor retries on anything but a 200, so a valid signature always
/// gets `{received:true}` whether or not a matching booking exists. Only a
/// bad or missing signature is refused.
pub async fn paystack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    handle(&state, &headers, &body).await
}

/// POST /
///
/// Deployments have pointed the processor at the bare origin before; a
/// request carrying the signature header is treated as a webhook rather
/// than bounced.
pub async fn root_fallback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    if !headers.contains_key(SIGNATURE_HEADER) {
        return Err(ApiError::NotFound("Not found".to_string()));
    }
    handle(&state, &headers, &body).await
}

async fn handle(
    state: &AppState,
    headers: &HeaderMap,
    body: &str,
) -> Result<Json<Value>, ApiError> {
    let secret = state
        .settings
        .paystack_secret_key
        .as_deref()
        .ok_or_else(|| ApiError::AuthRequired("Webhook secret not configured".to_string()))?;

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::AuthRequired("Missing webhook signature".to_string()))?;

    if !signature::verify(secret, body.as_bytes(), provided) {
        return Err(ApiError::AuthRequired("Invalid webhook signature".to_string()));
    }

    let event: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    if event["event"] == "charge.success" {
        if let Some(reference) = event["data"]["reference"].as_str() {
            tracing::info!(reference, "processing charge.success webhook");

            if let Err(e) = state.bookings.mark_confirmed_by_reference(reference).await {
                tracing::warn!(reference, error = %e, "failed to promote bookings");
            }

            run_receipt_fallback(state, reference).await;
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// If the synchronous confirmation never produced a receipt, generate one
/// here and notify the passenger. A receipt row already on file means the
/// synchronous path (or an earlier webhook) finished the job, so a repeat
/// webhook sends no second SMS.
async fn run_receipt_fallback(state: &AppState, reference: &str) {
    let bookings = match state.bookings.find_by_reference(reference).await {
        Ok(bookings) => bookings,
        Err(e) => {
            tracing::warn!(reference, error = %e, "webhook fallback lookup failed");
            return;
        }
    };
    let Some(first) = bookings.first() else {
        return;
    };

    match state.bookings.has_receipt(first.id).await {
        Ok(false) => {
            let trip = match first.trip_id {
                Some(trip_id) => state.trips.get(trip_id).await.ok(),
                None => None,
            };
            emit_receipt_and_sms(state, reference, trip.as_ref()).await;
        }
        Ok(true) => {
            tracing::debug!(reference, "receipt already on file, skipping fallback");
        }
        Err(e) => {
            tracing::warn!(reference, error = %e, "webhook fallback receipt check failed");
        }
    }
}
