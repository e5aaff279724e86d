use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// One sold seat. `external_ref` carries the payment processor's reference:
/// the raw reference for a single-seat purchase, `<ref>:<seat>` per seat for
/// a multi-seat purchase, so the reference stays the idempotency key across
/// both shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub passenger_id: i64,
    pub bus_id: i64,
    pub trip_id: Option<i64>,
    pub seat_number: String,
    pub price_paid: f64,
    pub status: BookingStatus,
    pub external_ref: Option<String>,
    pub created_at: String,
}

/// Contact details captured at purchase time. A repeat traveller yields a
/// fresh row per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nok_name: Option<String>,
    pub nok_phone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking_id: i64,
    pub receipt_url: String,
    pub drive_file_id: Option<String>,
    pub created_at: String,
}

/// Customer-facing booking code.
pub fn booking_code(id: i64) -> String {
    format!("ELITE-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_code() {
        assert_eq!(booking_code(17), "ELITE-17");
    }

    #[test]
    fn test_status_round_trip() {
        let s: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
        assert_eq!(s.as_str(), "confirmed");
    }
}
