use elite_domain::seat::SeatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Seat(#[from] SeatError),

    #[error("Bus {0} not found")]
    BusNotFound(i64),

    #[error("Route {0} not found")]
    RouteNotFound(i64),

    #[error("Trip {0} not found")]
    TripNotFound(i64),

    #[error("Trip {0} is not active")]
    TripNotActive(i64),

    #[error("Bus {0} already has an active trip")]
    ActiveTripExists(i64),

    #[error("Seat {0} is held by another session")]
    SeatAlreadyLocked(String),

    #[error("Seat {0} is already booked")]
    SeatAlreadyBooked(String),

    #[error("No valid hold on seat {0} for this session")]
    LockExpired(String),
}
