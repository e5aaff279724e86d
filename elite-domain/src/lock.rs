use chrono::Duration;
use serde::{Deserialize, Serialize};

/// How long a seat hold survives without a refresh.
pub fn lock_ttl() -> Duration {
    Duration::minutes(5)
}

/// A short-lived hold on one seat. `locked_by` is the opaque lock-session
/// identifier known only to the holding client; it alone may refresh the
/// hold, release it, or confirm it into a booking. Expired rows are treated
/// as absent by every reader and reaped lazily on the next acquire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLock {
    pub id: i64,
    pub bus_id: i64,
    pub trip_id: Option<i64>,
    pub seat_number: String,
    pub locked_by: String,
    pub expires_at: i64,
}

/// Result of a successful acquire or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SeatLockGrant {
    pub lock_id: String,
    pub trip_id: Option<i64>,
    pub seat: String,
    pub expires_at: i64,
}

/// Availability picture for one (bus, trip). Seats the caller itself holds
/// stay in `available` so a client can keep rendering them as selectable,
/// and are repeated in `own_locked`.
#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub trip_id: Option<i64>,
    pub available: Vec<String>,
    pub locked: Vec<String>,
    pub own_locked: Vec<String>,
    pub booked: Vec<String>,
}
