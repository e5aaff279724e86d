use chrono::Utc;
use elite_domain::booking::{booking_code, Booking, BookingStatus, Passenger};
use elite_domain::seat::SeatKey;
use serde_json::{json, Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::StoreError;

pub struct BookingRepository {
    pool: SqlitePool,
}

#[derive(Debug, Default, Clone)]
pub struct NewPassenger {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nok_name: Option<String>,
    pub nok_phone: Option<String>,
}

/// Everything needed to rebuild a confirmation response for a payment
/// reference, fresh or on an idempotent retry.
#[derive(Debug, Clone)]
pub struct BookingDisplay {
    pub booking_ids: Vec<i64>,
    pub passenger_name: String,
    pub route_name: String,
    pub bus_name: String,
    pub seats: Vec<String>,
    pub total_price: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct UpcomingFilter {
    pub route_id: Option<i64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    passenger_id: i64,
    bus_id: i64,
    trip_id: Option<i64>,
    seat_number: String,
    price_paid: f64,
    status: String,
    external_ref: Option<String>,
    created_at: String,
}

fn into_booking(row: BookingRow) -> Result<Booking, StoreError> {
    let status: BookingStatus = row
        .status
        .parse()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;

    Ok(Booking {
        id: row.id,
        passenger_id: row.passenger_id,
        bus_id: row.bus_id,
        trip_id: row.trip_id,
        seat_number: row.seat_number,
        price_paid: row.price_paid,
        status,
        external_ref: row.external_ref,
        created_at: row.created_at,
    })
}

impl BookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All bookings written under a processor reference, whichever shape the
    /// ref was stored in: the raw value for single-seat purchases or
    /// `<ref>:<seat>` per seat for multi-seat ones. The prefix check is a
    /// literal substr comparison, not LIKE, so wildcard characters in a
    /// caller-supplied reference match nothing but themselves.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT id, passenger_id, bus_id, trip_id, seat_number, price_paid, status, \
                    external_ref, created_at \
             FROM bookings \
             WHERE external_ref = ? \
                OR substr(external_ref, 1, length(?) + 1) = ? || ':' \
             ORDER BY id",
        )
        .bind(reference)
        .bind(reference)
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_booking).collect()
    }

    pub async fn create_passenger(&self, passenger: &NewPassenger) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO passengers \
                 (first_name, last_name, email, phone, nok_name, nok_phone, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&passenger.first_name)
        .bind(&passenger.last_name)
        .bind(&passenger.email)
        .bind(&passenger.phone)
        .bind(&passenger.nok_name)
        .bind(&passenger.nok_phone)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn delete_passenger(&self, passenger_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM passengers WHERE id = ?")
            .bind(passenger_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conditional insert of one confirmed seat. Returns the new booking id,
    /// or None when a confirmed booking (canonical or legacy spelling)
    /// already owns the seat - the caller compensates and reports the
    /// conflict.
    pub async fn insert_confirmed_seat(
        &self,
        bus_id: i64,
        trip_id: Option<i64>,
        seat: &SeatKey,
        passenger_id: i64,
        price_paid: f64,
        external_ref: &str,
    ) -> Result<Option<i64>, StoreError> {
        let canonical = seat.canonical();
        let legacy = seat.legacy().unwrap_or_else(|| canonical.clone());

        let result = sqlx::query(
            "INSERT INTO bookings \
                 (passenger_id, bus_id, trip_id, seat_number, price_paid, status, \
                  external_ref, created_at) \
             SELECT ?, ?, ?, ?, ?, 'confirmed', ?, ? \
             WHERE NOT EXISTS \
                 (SELECT 1 FROM bookings \
                  WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
                    AND seat_number IN (?, ?) AND status = 'confirmed')",
        )
        .bind(passenger_id)
        .bind(bus_id)
        .bind(trip_id)
        .bind(&canonical)
        .bind(price_paid)
        .bind(external_ref)
        .bind(Utc::now().to_rfc3339())
        .bind(bus_id)
        .bind(trip_id.unwrap_or(-1))
        .bind(&canonical)
        .bind(&legacy)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(result.last_insert_rowid()))
        }
    }

    pub async fn delete_booking(&self, booking_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refresh the denormalized seat hint on the bus row from the trip's
    /// confirmed count. Only meaningful in trip-aware mode.
    pub async fn refresh_available_hint(&self, bus_id: i64, trip_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE buses SET available_seats = MAX(capacity - \
                 (SELECT COUNT(*) FROM bookings \
                  WHERE bus_id = ? AND trip_id = ? AND status = 'confirmed'), 0) \
             WHERE id = ?",
        )
        .bind(bus_id)
        .bind(trip_id)
        .bind(bus_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_confirmed_by_reference(&self, reference: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'confirmed' \
             WHERE (external_ref = ? \
                    OR substr(external_ref, 1, length(?) + 1) = ? || ':') \
               AND status != 'confirmed'",
        )
        .bind(reference)
        .bind(reference)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_receipt(
        &self,
        booking_id: i64,
        receipt_url: &str,
        drive_file_id: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO booking_receipts \
                 (booking_id, receipt_url, drive_file_id, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(booking_id)
        .bind(receipt_url)
        .bind(drive_file_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn has_receipt(&self, booking_id: i64) -> Result<bool, StoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM booking_receipts WHERE booking_id = ?")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Joined view of everything the confirmation response needs for a
    /// reference. Used both for fresh confirmations and idempotent replays.
    pub async fn display_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<BookingDisplay>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct DisplayRow {
            id: i64,
            seat_number: String,
            price_paid: f64,
            first_name: String,
            last_name: String,
            email: Option<String>,
            phone: Option<String>,
            bus_name: String,
            route_name: String,
            receipt_url: Option<String>,
        }

        let rows: Vec<DisplayRow> = sqlx::query_as(
            "SELECT bk.id, bk.seat_number, bk.price_paid, \
                    p.first_name, p.last_name, p.email, p.phone, \
                    bus.name AS bus_name, \
                    COALESCE(r.name, bus.route_text, '') AS route_name, \
                    br.receipt_url \
             FROM bookings bk \
             JOIN passengers p ON p.id = bk.passenger_id \
             JOIN buses bus ON bus.id = bk.bus_id \
             LEFT JOIN routes r ON r.id = bus.route_id \
             LEFT JOIN booking_receipts br ON br.booking_id = bk.id \
             WHERE bk.external_ref = ? \
                OR substr(bk.external_ref, 1, length(?) + 1) = ? || ':' \
             ORDER BY bk.id",
        )
        .bind(reference)
        .bind(reference)
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        Ok(Some(BookingDisplay {
            passenger_name: format!("{} {}", first.first_name, first.last_name),
            route_name: first.route_name.clone(),
            bus_name: first.bus_name.clone(),
            phone: first.phone.clone(),
            email: first.email.clone(),
            receipt_url: rows.iter().find_map(|r| r.receipt_url.clone()),
            total_price: rows.iter().map(|r| r.price_paid).sum(),
            booking_ids: rows.iter().map(|r| r.id).collect(),
            seats: rows.iter().map(|r| r.seat_number.clone()).collect(),
        }))
    }

    pub async fn list_passengers(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Passenger>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct PassengerRow {
            id: i64,
            first_name: String,
            last_name: String,
            email: Option<String>,
            phone: Option<String>,
            nok_name: Option<String>,
            nok_phone: Option<String>,
            created_at: String,
        }

        let rows: Vec<PassengerRow> = sqlx::query_as(
            "SELECT id, first_name, last_name, email, phone, nok_name, nok_phone, created_at \
             FROM passengers ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Passenger {
                id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
                nok_name: row.nok_name,
                nok_phone: row.nok_phone,
                created_at: row.created_at,
            })
            .collect())
    }

    pub async fn bookings_for_email(&self, email: &str) -> Result<Vec<Value>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct UserBookingRow {
            id: i64,
            seat_number: String,
            status: String,
            price_paid: f64,
            created_at: String,
            external_ref: Option<String>,
            bus_name: String,
            route_name: String,
            departure_date: Option<String>,
            departure_time: Option<String>,
            receipt_url: Option<String>,
        }

        let rows: Vec<UserBookingRow> = sqlx::query_as(
            "SELECT bk.id, bk.seat_number, bk.status, bk.price_paid, bk.created_at, \
                    bk.external_ref, bus.name AS bus_name, \
                    COALESCE(r.name, bus.route_text, '') AS route_name, \
                    t.departure_date, t.departure_time, br.receipt_url \
             FROM bookings bk \
             JOIN passengers p ON p.id = bk.passenger_id \
             JOIN buses bus ON bus.id = bk.bus_id \
             LEFT JOIN routes r ON r.id = bus.route_id \
             LEFT JOIN trip_schedules t ON t.id = bk.trip_id \
             LEFT JOIN booking_receipts br ON br.booking_id = bk.id \
             WHERE LOWER(p.email) = LOWER(?) \
             ORDER BY bk.created_at DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                json!({
                    "booking_id": booking_code(row.id),
                    "seat": row.seat_number,
                    "status": row.status,
                    "price": row.price_paid,
                    "reference": row.external_ref,
                    "bus_name": row.bus_name,
                    "route_name": row.route_name,
                    "departure_date": row.departure_date,
                    "departure_time": row.departure_time,
                    "receipt_url": row.receipt_url,
                    "created_at": row.created_at,
                })
            })
            .collect())
    }

    /// Joined upcoming-bookings report: filtered, departure-ordered (nulls
    /// last), paginated, grouped per route, with a revenue summary over the
    /// whole filtered set.
    pub async fn upcoming(&self, filter: &UpcomingFilter) -> Result<Value, StoreError> {
        #[derive(sqlx::FromRow)]
        struct UpcomingRow {
            id: i64,
            seat_number: String,
            status: String,
            price_paid: f64,
            created_at: String,
            passenger_name: String,
            phone: Option<String>,
            bus_name: String,
            route_name: String,
            departure_date: Option<String>,
            departure_time: Option<String>,
        }

        fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UpcomingFilter) {
            if let Some(route_id) = filter.route_id {
                qb.push(" AND COALESCE(t.route_id, bus.route_id) = ")
                    .push_bind(route_id);
            }
            if let Some(from) = &filter.date_from {
                qb.push(" AND t.departure_date >= ").push_bind(from.clone());
            }
            if let Some(to) = &filter.date_to {
                qb.push(" AND t.departure_date <= ").push_bind(to.clone());
            }
            if let Some(status) = &filter.status {
                qb.push(" AND bk.status = ").push_bind(status.clone());
            }
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT bk.id, bk.seat_number, bk.status, bk.price_paid, bk.created_at, \
                    p.first_name || ' ' || p.last_name AS passenger_name, p.phone, \
                    bus.name AS bus_name, \
                    COALESCE(r.name, bus.route_text, '') AS route_name, \
                    t.departure_date, t.departure_time \
             FROM bookings bk \
             JOIN passengers p ON p.id = bk.passenger_id \
             JOIN buses bus ON bus.id = bk.bus_id \
             LEFT JOIN trip_schedules t ON t.id = bk.trip_id \
             LEFT JOIN routes r ON r.id = COALESCE(t.route_id, bus.route_id) \
             WHERE 1 = 1",
        );
        push_filters(&mut qb, filter);
        qb.push(
            " ORDER BY CASE WHEN t.departure_date IS NULL THEN 1 ELSE 0 END, \
              t.departure_date || ' ' || COALESCE(t.departure_time, ''), \
              bk.created_at DESC",
        );
        qb.push(" LIMIT ").push_bind(filter.limit);
        qb.push(" OFFSET ").push_bind(filter.offset);

        let rows: Vec<UpcomingRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(CASE WHEN bk.status = 'confirmed' \
                                      THEN bk.price_paid ELSE 0.0 END), 0.0) AS revenue \
             FROM bookings bk \
             JOIN passengers p ON p.id = bk.passenger_id \
             JOIN buses bus ON bus.id = bk.bus_id \
             LEFT JOIN trip_schedules t ON t.id = bk.trip_id \
             WHERE 1 = 1",
        );
        push_filters(&mut qb, filter);
        let (total, revenue): (i64, f64) = qb.build_query_as().fetch_one(&self.pool).await?;

        let mut groups: Map<String, Value> = Map::new();
        for row in rows {
            let entry = json!({
                "booking_id": booking_code(row.id),
                "passenger_name": row.passenger_name,
                "phone": row.phone,
                "seat": row.seat_number,
                "status": row.status,
                "price": row.price_paid,
                "bus_name": row.bus_name,
                "departure_date": row.departure_date,
                "departure_time": row.departure_time,
                "created_at": row.created_at,
            });
            groups
                .entry(row.route_name)
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .expect("group entries are arrays")
                .push(entry);
        }

        Ok(json!({
            "groups": groups,
            "summary": { "total_bookings": total, "total_revenue": revenue },
            "limit": filter.limit,
            "offset": filter.offset,
        }))
    }

    pub async fn dashboard(&self) -> Result<Value, StoreError> {
        let route_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM routes")
            .fetch_one(&self.pool)
            .await?;
        let bus_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buses")
            .fetch_one(&self.pool)
            .await?;
        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM bookings GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let mut bookings = json!({ "pending": 0, "confirmed": 0, "cancelled": 0 });
        for (status, count) in by_status {
            bookings[status] = json!(count);
        }

        let revenue: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(price_paid), 0.0) FROM bookings WHERE status = 'confirmed'",
        )
        .fetch_one(&self.pool)
        .await?;

        #[derive(sqlx::FromRow)]
        struct RecentRow {
            id: i64,
            seat_number: String,
            status: String,
            price_paid: f64,
            created_at: String,
            passenger_name: String,
            bus_name: String,
            receipt_url: Option<String>,
        }

        let recent: Vec<RecentRow> = sqlx::query_as(
            "SELECT bk.id, bk.seat_number, bk.status, bk.price_paid, bk.created_at, \
                    p.first_name || ' ' || p.last_name AS passenger_name, \
                    bus.name AS bus_name, br.receipt_url \
             FROM bookings bk \
             JOIN passengers p ON p.id = bk.passenger_id \
             JOIN buses bus ON bus.id = bk.bus_id \
             LEFT JOIN booking_receipts br ON br.booking_id = bk.id \
             ORDER BY bk.id DESC LIMIT 8",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent: Vec<Value> = recent
            .into_iter()
            .map(|row| {
                json!({
                    "booking_id": booking_code(row.id),
                    "passenger_name": row.passenger_name,
                    "bus_name": row.bus_name,
                    "seat": row.seat_number,
                    "status": row.status,
                    "price": row.price_paid,
                    "receipt_url": row.receipt_url,
                    "created_at": row.created_at,
                })
            })
            .collect();

        Ok(json!({
            "routes": route_count,
            "buses": bus_count,
            "users": user_count,
            "bookings": bookings,
            "confirmed_revenue": revenue,
            "recent_bookings": recent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbClient;

    async fn seeded() -> (DbClient, BookingRepository, i64) {
        let db = DbClient::in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();

        sqlx::query("INSERT INTO route_groups (key, name) VALUES ('east', 'Eastern routes')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO routes (group_id, name) VALUES (1, 'Accra - Ho')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO buses (route_id, name, capacity, available_seats, price) \
             VALUES (1, 'Fleet 3', 50, 50, 60.0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let repo = BookingRepository::new(db.pool.clone());
        (db, repo, 1)
    }

    fn passenger() -> NewPassenger {
        NewPassenger {
            first_name: "Kofi".into(),
            last_name: "Boateng".into(),
            email: Some("kofi@example.com".into()),
            phone: Some("+233200000001".into()),
            ..NewPassenger::default()
        }
    }

    #[tokio::test]
    async fn test_conditional_insert_refuses_double_sale() {
        let (_db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();
        let seat = SeatKey::parse("5", 50).unwrap();

        let first = repo
            .insert_confirmed_seat(bus, None, &seat, pid, 60.0, "R1")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = repo
            .insert_confirmed_seat(bus, None, &seat, pid, 60.0, "R2")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_conditional_insert_sees_legacy_rows() {
        let (db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();

        sqlx::query(
            "INSERT INTO bookings \
                 (passenger_id, bus_id, seat_number, price_paid, status, external_ref, created_at) \
             VALUES (?, ?, 'D8', 60.0, 'confirmed', 'OLD', '2025-01-01T00:00:00Z')",
        )
        .bind(pid)
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        let seat = SeatKey::parse("38", 50).unwrap();
        let refused = repo
            .insert_confirmed_seat(bus, None, &seat, pid, 60.0, "R9")
            .await
            .unwrap();
        assert!(refused.is_none());
    }

    #[tokio::test]
    async fn test_trip_namespaces_are_distinct() {
        let (db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();
        let seat = SeatKey::parse("5", 50).unwrap();

        sqlx::query(
            "INSERT INTO trip_schedules (route_id, bus_id, price, status) \
             VALUES (1, ?, 60.0, 'active')",
        )
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        // Null-trip sale does not block the scheduled trip's seat 5.
        repo.insert_confirmed_seat(bus, None, &seat, pid, 60.0, "RN")
            .await
            .unwrap()
            .unwrap();
        let on_trip = repo
            .insert_confirmed_seat(bus, Some(1), &seat, pid, 60.0, "RT")
            .await
            .unwrap();
        assert!(on_trip.is_some());
    }

    #[tokio::test]
    async fn test_reference_lookup_covers_both_shapes() {
        let (_db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();

        let s5 = SeatKey::parse("5", 50).unwrap();
        let s6 = SeatKey::parse("6", 50).unwrap();
        repo.insert_confirmed_seat(bus, None, &s5, pid, 30.0, "R7:5")
            .await
            .unwrap()
            .unwrap();
        repo.insert_confirmed_seat(bus, None, &s6, pid, 30.0, "R7:6")
            .await
            .unwrap()
            .unwrap();

        let found = repo.find_by_reference("R7").await.unwrap();
        assert_eq!(found.len(), 2);

        let display = repo.display_by_reference("R7").await.unwrap().unwrap();
        assert_eq!(display.seats, vec!["5", "6"]);
        assert_eq!(display.total_price, 60.0);
        assert_eq!(display.passenger_name, "Kofi Boateng");
    }

    #[tokio::test]
    async fn test_reference_lookup_is_literal_not_wildcard() {
        let (_db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();

        let s5 = SeatKey::parse("5", 50).unwrap();
        let s6 = SeatKey::parse("6", 50).unwrap();
        repo.insert_confirmed_seat(bus, None, &s5, pid, 30.0, "AB12:5")
            .await
            .unwrap()
            .unwrap();
        repo.insert_confirmed_seat(bus, None, &s6, pid, 30.0, "A_12")
            .await
            .unwrap()
            .unwrap();

        // SQL wildcards in a caller-supplied reference must match only
        // themselves, never act as patterns.
        for probe in ["A%", "%", "_", "A_12:5", "AB1_"] {
            assert!(
                repo.find_by_reference(probe).await.unwrap().is_empty(),
                "probe {probe:?} must not match"
            );
            assert!(repo.display_by_reference(probe).await.unwrap().is_none());
            assert_eq!(repo.mark_confirmed_by_reference(probe).await.unwrap(), 0);
        }

        // The literal prefixes and exact refs still resolve.
        assert_eq!(repo.find_by_reference("AB12").await.unwrap().len(), 1);
        assert_eq!(repo.find_by_reference("A_12").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_promotion_and_receipt_tracking() {
        let (db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();

        sqlx::query(
            "INSERT INTO bookings \
                 (passenger_id, bus_id, seat_number, price_paid, status, external_ref, created_at) \
             VALUES (?, ?, '9', 60.0, 'pending', 'R9', '2026-01-01T00:00:00Z')",
        )
        .bind(pid)
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        assert_eq!(repo.mark_confirmed_by_reference("R9").await.unwrap(), 1);
        // Re-running promotes nothing further.
        assert_eq!(repo.mark_confirmed_by_reference("R9").await.unwrap(), 0);

        let booking = &repo.find_by_reference("R9").await.unwrap()[0];
        assert!(!repo.has_receipt(booking.id).await.unwrap());
        repo.insert_receipt(booking.id, "https://r.example/1.pdf", None)
            .await
            .unwrap();
        assert!(repo.has_receipt(booking.id).await.unwrap());
        // Duplicate receipt rows are ignored.
        repo.insert_receipt(booking.id, "https://r.example/other.pdf", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upcoming_groups_and_summary() {
        let (db, repo, bus) = seeded().await;
        let pid = repo.create_passenger(&passenger()).await.unwrap();

        sqlx::query(
            "INSERT INTO trip_schedules (route_id, bus_id, departure_date, departure_time, \
                                         price, status) \
             VALUES (1, ?, '2026-09-01', '06:30', 60.0, 'active')",
        )
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        let seat = SeatKey::parse("1", 50).unwrap();
        repo.insert_confirmed_seat(bus, Some(1), &seat, pid, 60.0, "RA")
            .await
            .unwrap()
            .unwrap();

        let report = repo
            .upcoming(&UpcomingFilter {
                limit: 50,
                ..UpcomingFilter::default()
            })
            .await
            .unwrap();

        assert_eq!(report["summary"]["total_bookings"], 1);
        assert_eq!(report["summary"]["total_revenue"], 60.0);
        assert_eq!(report["groups"]["Accra - Ho"][0]["seat"], "1");

        let none = repo
            .upcoming(&UpcomingFilter {
                status: Some("cancelled".into()),
                limit: 50,
                ..UpcomingFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(none["summary"]["total_bookings"], 0);
    }
}
