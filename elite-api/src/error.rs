use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use elite_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InputInvalid(String),

    #[error("Seat {0} is held by another session")]
    SeatAlreadyLocked(String),

    #[error("Seat {0} is already booked")]
    SeatAlreadyBooked(String),

    #[error("No valid hold on seat {0} for this session")]
    LockExpired(String),

    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("Payment amount mismatch: expected {expected}, processor reported {actual}")]
    PaymentAmountMismatch { expected: i64, actual: i64 },

    #[error("{0}")]
    AuthRequired(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InputInvalid(_)
            | ApiError::SeatAlreadyLocked(_)
            | ApiError::SeatAlreadyBooked(_)
            | ApiError::LockExpired(_)
            | ApiError::PaymentVerificationFailed(_)
            | ApiError::PaymentAmountMismatch { .. } => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_message = match self {
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {err:#}");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => ApiError::Internal(e.into()),
            StoreError::Seat(e) => ApiError::InputInvalid(e.to_string()),
            StoreError::BusNotFound(id) => ApiError::NotFound(format!("Bus {id} not found")),
            StoreError::RouteNotFound(id) => ApiError::NotFound(format!("Route {id} not found")),
            StoreError::TripNotFound(id) => ApiError::NotFound(format!("Trip {id} not found")),
            StoreError::TripNotActive(id) => {
                ApiError::InputInvalid(format!("Trip {id} is not active"))
            }
            StoreError::ActiveTripExists(bus) => {
                ApiError::InputInvalid(format!("Bus {bus} already has an active trip"))
            }
            StoreError::SeatAlreadyLocked(seat) => ApiError::SeatAlreadyLocked(seat),
            StoreError::SeatAlreadyBooked(seat) => ApiError::SeatAlreadyBooked(seat),
            StoreError::LockExpired(seat) => ApiError::LockExpired(seat),
        }
    }
}
