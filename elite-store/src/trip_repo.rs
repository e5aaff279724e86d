use chrono::Utc;
use elite_domain::trip::{TripSchedule, TripStatus};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::StoreError;

const TRIP_COLUMNS: &str =
    "id, route_id, bus_id, departure_date, departure_time, price, status, started_at, ended_at";

pub struct TripRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: i64,
    route_id: i64,
    bus_id: i64,
    departure_date: Option<String>,
    departure_time: Option<String>,
    price: f64,
    status: String,
    started_at: Option<String>,
    ended_at: Option<String>,
}

fn into_trip(row: TripRow) -> Result<TripSchedule, StoreError> {
    let status: TripStatus = row
        .status
        .parse()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;

    Ok(TripSchedule {
        id: row.id,
        route_id: row.route_id,
        bus_id: row.bus_id,
        departure_date: row.departure_date,
        departure_time: row.departure_time,
        price: row.price,
        status,
        started_at: row.started_at,
        ended_at: row.ended_at,
    })
}

impl TripRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve the trip a seat operation runs against. An explicit trip id
    /// must exist, belong to the bus, and be active; otherwise the bus's
    /// most recent active trip is used, and None means the store is running
    /// in the backward-compatible trip-null mode.
    pub async fn resolve_active(
        &self,
        bus_id: i64,
        trip_id: Option<i64>,
    ) -> Result<Option<TripSchedule>, StoreError> {
        match trip_id {
            Some(id) => {
                let row: Option<TripRow> = sqlx::query_as(&format!(
                    "SELECT {TRIP_COLUMNS} FROM trip_schedules WHERE id = ?"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

                let row = row.ok_or(StoreError::TripNotFound(id))?;
                if row.bus_id != bus_id {
                    return Err(StoreError::TripNotFound(id));
                }

                let trip = into_trip(row)?;
                if trip.status != TripStatus::Active {
                    return Err(StoreError::TripNotActive(id));
                }
                Ok(Some(trip))
            }
            None => {
                let row: Option<TripRow> = sqlx::query_as(&format!(
                    "SELECT {TRIP_COLUMNS} FROM trip_schedules \
                     WHERE bus_id = ? AND status = 'active' ORDER BY id DESC LIMIT 1"
                ))
                .bind(bus_id)
                .fetch_optional(&self.pool)
                .await?;

                row.map(into_trip).transpose()
            }
        }
    }

    pub async fn get(&self, trip_id: i64) -> Result<TripSchedule, StoreError> {
        let row: Option<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip_schedules WHERE id = ?"
        ))
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;

        into_trip(row.ok_or(StoreError::TripNotFound(trip_id))?)
    }

    /// Schedule a trip. Refuses while the bus still has an active trip; on
    /// success the bus row is re-pointed at the trip's route and price and
    /// its seat hint reset to full capacity.
    pub async fn create(
        &self,
        route_id: i64,
        bus_id: i64,
        departure_date: Option<String>,
        departure_time: Option<String>,
        price: Option<f64>,
    ) -> Result<TripSchedule, StoreError> {
        let bus_price: Option<f64> = sqlx::query_scalar("SELECT price FROM buses WHERE id = ?")
            .bind(bus_id)
            .fetch_optional(&self.pool)
            .await?;
        let price = price.unwrap_or(bus_price.ok_or(StoreError::BusNotFound(bus_id))?);

        let result = sqlx::query(
            "INSERT INTO trip_schedules \
                 (route_id, bus_id, departure_date, departure_time, price, status, started_at) \
             SELECT ?, ?, ?, ?, ?, 'active', ? \
             WHERE NOT EXISTS \
                 (SELECT 1 FROM trip_schedules WHERE bus_id = ? AND status = 'active')",
        )
        .bind(route_id)
        .bind(bus_id)
        .bind(&departure_date)
        .bind(&departure_time)
        .bind(price)
        .bind(Utc::now().to_rfc3339())
        .bind(bus_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ActiveTripExists(bus_id));
        }
        let trip_id = result.last_insert_rowid();

        sqlx::query(
            "UPDATE buses SET available_seats = capacity, route_id = ?, price = ? WHERE id = ?",
        )
        .bind(route_id)
        .bind(price)
        .bind(bus_id)
        .execute(&self.pool)
        .await?;

        self.get(trip_id).await
    }

    /// Complete an active trip: terminal status, seat hint back to capacity,
    /// and every hold on the trip wiped.
    pub async fn end(&self, trip_id: i64) -> Result<TripSchedule, StoreError> {
        let trip = self.get(trip_id).await?;
        if trip.status != TripStatus::Active {
            return Err(StoreError::TripNotActive(trip_id));
        }

        sqlx::query("UPDATE trip_schedules SET status = 'completed', ended_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(trip_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("UPDATE buses SET available_seats = capacity WHERE id = ?")
            .bind(trip.bus_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM seat_locks WHERE trip_id = ?")
            .bind(trip_id)
            .execute(&self.pool)
            .await?;

        self.get(trip_id).await
    }

    pub async fn active_overview(&self) -> Result<Vec<serde_json::Value>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct OverviewRow {
            id: i64,
            route_id: i64,
            bus_id: i64,
            departure_date: Option<String>,
            departure_time: Option<String>,
            price: f64,
            bus_name: String,
            capacity: i64,
            route_name: Option<String>,
            booked_count: i64,
        }

        let rows: Vec<OverviewRow> = sqlx::query_as(
            "SELECT t.id, t.route_id, t.bus_id, t.departure_date, t.departure_time, t.price, \
                    b.name AS bus_name, b.capacity, r.name AS route_name, \
                    (SELECT COUNT(*) FROM bookings bk \
                     WHERE bk.trip_id = t.id AND bk.status = 'confirmed') AS booked_count \
             FROM trip_schedules t \
             JOIN buses b ON b.id = t.bus_id \
             LEFT JOIN routes r ON r.id = t.route_id \
             WHERE t.status = 'active' \
             ORDER BY t.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                json!({
                    "id": row.id,
                    "route_id": row.route_id,
                    "route_name": row.route_name,
                    "bus_id": row.bus_id,
                    "bus_name": row.bus_name,
                    "departure_date": row.departure_date,
                    "departure_time": row.departure_time,
                    "price": row.price,
                    "booked_count": row.booked_count,
                    "seats_left": (row.capacity - row.booked_count).max(0),
                })
            })
            .collect())
    }

    pub async fn recent_inactive(&self, limit: i64) -> Result<Vec<TripSchedule>, StoreError> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip_schedules \
             WHERE status != 'active' ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_trip).collect()
    }
}
