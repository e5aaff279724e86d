use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGroup {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Fleet vehicle. `available_seats` is a denormalized hint refreshed on
/// finalization and trip end; the catalog derives live truth from bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: i64,
    pub route_id: Option<i64>,
    pub name: String,
    pub plate_number: Option<String>,
    pub capacity: i64,
    pub available_seats: i64,
    pub price: f64,
    pub route_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TripStatus::Active),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(format!("unknown trip status: {other}")),
        }
    }
}

/// A scheduled departure. While `active` this row, not the bus, is the
/// authoritative source of price and departure for its bus. A bus has at
/// most one active trip; when none exists the system runs in the
/// backward-compatible trip-null mode against the bus row alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSchedule {
    pub id: i64,
    pub route_id: i64,
    pub bus_id: i64,
    pub departure_date: Option<String>,
    pub departure_time: Option<String>,
    pub price: f64,
    pub status: TripStatus,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}
