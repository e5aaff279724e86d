//! Seat availability and the seat-lock lifecycle.
//!
//! Uniqueness of unexpired holds per (bus, trip, seat) rides on the store's
//! serialized writes plus a conditional insert, so two clients racing for
//! the same seat cannot both win. Expired rows are never swept in the
//! background: readers treat `expires_at <= now` as absent and acquire
//! reaps them lazily.

use std::collections::BTreeSet;

use chrono::Utc;
use elite_domain::lock::{lock_ttl, SeatLockGrant, SeatMap};
use elite_domain::seat::SeatKey;
use elite_domain::trip::TripSchedule;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::StoreError;

pub struct SeatRepository {
    pool: SqlitePool,
}

fn new_lock_id() -> String {
    format!("lk_{}", Uuid::new_v4().simple())
}

/// Trip-null mode compares as -1, distinct from every real trip id.
fn trip_key(trip: Option<&TripSchedule>) -> i64 {
    trip.map(|t| t.id).unwrap_or(-1)
}

impl SeatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn bus_capacity(&self, bus_id: i64) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT capacity FROM buses WHERE id = ?")
            .bind(bus_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::BusNotFound(bus_id))
    }

    /// Availability picture for one (bus, trip). Seats held by `owner`
    /// stay available to that caller and are echoed in `own_locked`.
    pub async fn seat_map(
        &self,
        bus_id: i64,
        trip: Option<&TripSchedule>,
        owner: Option<&str>,
    ) -> Result<SeatMap, StoreError> {
        let capacity = self.bus_capacity(bus_id).await?;
        let now = Utc::now().timestamp();

        let booked_rows: Vec<String> = sqlx::query_scalar(
            "SELECT seat_number FROM bookings \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? AND status = 'confirmed'",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .fetch_all(&self.pool)
        .await?;

        let lock_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT seat_number, locked_by FROM seat_locks \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? AND expires_at > ?",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        // Old rows may carry legacy spellings; parsing collapses duplicates.
        let mut booked = BTreeSet::new();
        for seat in booked_rows {
            if let Ok(key) = SeatKey::parse(&seat, capacity) {
                booked.insert(key.number());
            }
        }

        let mut locked = BTreeSet::new();
        let mut own_locked = BTreeSet::new();
        for (seat, locked_by) in lock_rows {
            let Ok(key) = SeatKey::parse(&seat, capacity) else {
                continue;
            };
            if owner == Some(locked_by.as_str()) {
                own_locked.insert(key.number());
            } else {
                locked.insert(key.number());
            }
        }

        let available: Vec<String> = (1..=capacity)
            .filter(|n| !booked.contains(n) && !locked.contains(n))
            .map(|n| n.to_string())
            .collect();

        let stringify = |set: BTreeSet<i64>| set.into_iter().map(|n| n.to_string()).collect();

        Ok(SeatMap {
            trip_id: trip.map(|t| t.id),
            available,
            locked: stringify(locked),
            own_locked: stringify(own_locked),
            booked: stringify(booked),
        })
    }

    /// Take or refresh a hold on one seat.
    pub async fn acquire(
        &self,
        bus_id: i64,
        trip: Option<&TripSchedule>,
        seat_raw: &str,
        lock_id: Option<String>,
    ) -> Result<SeatLockGrant, StoreError> {
        let capacity = self.bus_capacity(bus_id).await?;
        let key = SeatKey::parse(seat_raw, capacity)?;
        let canonical = key.canonical();
        let legacy = key.legacy().unwrap_or_else(|| canonical.clone());

        let owner = lock_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_lock_id);
        let now = Utc::now().timestamp();

        // Reap expired holds on this seat.
        sqlx::query(
            "DELETE FROM seat_locks \
             WHERE bus_id = ? AND seat_number IN (?, ?) AND expires_at <= ?",
        )
        .bind(bus_id)
        .bind(&canonical)
        .bind(&legacy)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // A scheduled trip owns the seat namespace: holds written against no
        // trip or a different trip no longer count for this seat.
        if let Some(t) = trip {
            sqlx::query(
                "DELETE FROM seat_locks \
                 WHERE bus_id = ? AND seat_number IN (?, ?) \
                   AND (trip_id IS NULL OR trip_id != ?)",
            )
            .bind(bus_id)
            .bind(&canonical)
            .bind(&legacy)
            .bind(t.id)
            .execute(&self.pool)
            .await?;
        }

        let holder: Option<String> = sqlx::query_scalar(
            "SELECT locked_by FROM seat_locks \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
               AND seat_number IN (?, ?) AND expires_at > ? \
             LIMIT 1",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(&canonical)
        .bind(&legacy)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(holder) = holder {
            if holder != owner {
                return Err(StoreError::SeatAlreadyLocked(canonical));
            }
        }

        let sold: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM bookings \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
               AND seat_number IN (?, ?) AND status = 'confirmed' \
             LIMIT 1",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(&canonical)
        .bind(&legacy)
        .fetch_optional(&self.pool)
        .await?;

        if sold.is_some() {
            return Err(StoreError::SeatAlreadyBooked(canonical));
        }

        let expires_at = now + lock_ttl().num_seconds();

        let refreshed = sqlx::query(
            "UPDATE seat_locks SET expires_at = ? \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
               AND seat_number IN (?, ?) AND locked_by = ?",
        )
        .bind(expires_at)
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(&canonical)
        .bind(&legacy)
        .bind(&owner)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if refreshed == 0 {
            // Conditional insert: loses cleanly if another session slipped
            // an unexpired hold in between the check and here.
            let inserted = sqlx::query(
                "INSERT INTO seat_locks (bus_id, trip_id, seat_number, locked_by, expires_at) \
                 SELECT ?, ?, ?, ?, ? \
                 WHERE NOT EXISTS \
                     (SELECT 1 FROM seat_locks \
                      WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
                        AND seat_number IN (?, ?) AND expires_at > ? AND locked_by != ?)",
            )
            .bind(bus_id)
            .bind(trip.map(|t| t.id))
            .bind(&canonical)
            .bind(&owner)
            .bind(expires_at)
            .bind(bus_id)
            .bind(trip_key(trip))
            .bind(&canonical)
            .bind(&legacy)
            .bind(now)
            .bind(&owner)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted == 0 {
                return Err(StoreError::SeatAlreadyLocked(canonical));
            }
        }

        Ok(SeatLockGrant {
            lock_id: owner,
            trip_id: trip.map(|t| t.id),
            seat: canonical,
            expires_at,
        })
    }

    /// Drop the caller's hold. Releasing a seat that is not held is a
    /// silent no-op, so unlock retries are harmless.
    pub async fn release(
        &self,
        bus_id: i64,
        trip: Option<&TripSchedule>,
        seat_raw: &str,
        lock_id: &str,
    ) -> Result<SeatKey, StoreError> {
        let capacity = self.bus_capacity(bus_id).await?;
        let key = SeatKey::parse(seat_raw, capacity)?;
        let canonical = key.canonical();
        let legacy = key.legacy().unwrap_or_else(|| canonical.clone());

        sqlx::query(
            "DELETE FROM seat_locks \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
               AND seat_number IN (?, ?) AND locked_by = ?",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(&canonical)
        .bind(&legacy)
        .bind(lock_id)
        .execute(&self.pool)
        .await?;

        Ok(key)
    }

    /// Whoever currently holds an unexpired lock on the seat, if anyone.
    pub async fn active_holder(
        &self,
        bus_id: i64,
        trip: Option<&TripSchedule>,
        seat: &SeatKey,
    ) -> Result<Option<String>, StoreError> {
        let canonical = seat.canonical();
        let legacy = seat.legacy().unwrap_or_else(|| canonical.clone());

        let holder: Option<String> = sqlx::query_scalar(
            "SELECT locked_by FROM seat_locks \
             WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
               AND seat_number IN (?, ?) AND expires_at > ? \
             LIMIT 1",
        )
        .bind(bus_id)
        .bind(trip_key(trip))
        .bind(&canonical)
        .bind(&legacy)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder)
    }

    /// Prove ownership of every seat ahead of finalization: one unexpired
    /// hold by `owner` per seat, or the whole claim fails.
    pub async fn owned_lock_ids(
        &self,
        bus_id: i64,
        trip: Option<&TripSchedule>,
        seats: &[SeatKey],
        owner: &str,
    ) -> Result<Vec<i64>, StoreError> {
        let now = Utc::now().timestamp();
        let mut lock_ids = Vec::with_capacity(seats.len());

        for key in seats {
            let canonical = key.canonical();
            let legacy = key.legacy().unwrap_or_else(|| canonical.clone());

            let id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM seat_locks \
                 WHERE bus_id = ? AND COALESCE(trip_id, -1) = ? \
                   AND seat_number IN (?, ?) AND locked_by = ? AND expires_at > ? \
                 LIMIT 1",
            )
            .bind(bus_id)
            .bind(trip_key(trip))
            .bind(&canonical)
            .bind(&legacy)
            .bind(owner)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

            lock_ids.push(id.ok_or(StoreError::LockExpired(canonical))?);
        }

        Ok(lock_ids)
    }

    pub async fn delete_locks(&self, lock_ids: &[i64]) -> Result<(), StoreError> {
        for id in lock_ids {
            sqlx::query("DELETE FROM seat_locks WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbClient;
    use crate::trip_repo::TripRepository;

    async fn seeded() -> (DbClient, SeatRepository, i64) {
        let db = DbClient::in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();

        sqlx::query("INSERT INTO route_groups (key, name) VALUES ('west', 'Western routes')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO routes (group_id, name) VALUES (1, 'Accra - Takoradi')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO buses (route_id, name, capacity, available_seats, price) \
             VALUES (1, 'Fleet 7', 50, 50, 80.0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let repo = SeatRepository::new(db.pool.clone());
        (db, repo, 1)
    }

    #[tokio::test]
    async fn test_acquire_generates_lock_id() {
        let (_db, repo, bus) = seeded().await;

        let grant = repo.acquire(bus, None, "5", None).await.unwrap();
        assert!(!grant.lock_id.is_empty());
        assert_eq!(grant.seat, "5");
        assert!(grant.expires_at > Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_second_session_loses_the_seat() {
        let (_db, repo, bus) = seeded().await;

        let a = repo.acquire(bus, None, "7", Some("lk_a".into())).await;
        assert!(a.is_ok());

        let b = repo.acquire(bus, None, "7", Some("lk_b".into())).await;
        assert!(matches!(b, Err(StoreError::SeatAlreadyLocked(s)) if s == "7"));
    }

    #[tokio::test]
    async fn test_same_owner_refreshes() {
        let (db, repo, bus) = seeded().await;

        repo.acquire(bus, None, "7", Some("lk_a".into())).await.unwrap();
        repo.acquire(bus, None, "7", Some("lk_a".into())).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seat_locks")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_expired_hold_is_reaped() {
        let (db, repo, bus) = seeded().await;

        sqlx::query(
            "INSERT INTO seat_locks (bus_id, seat_number, locked_by, expires_at) \
             VALUES (?, '9', 'lk_a', ?)",
        )
        .bind(bus)
        .bind(Utc::now().timestamp() - 1)
        .execute(&db.pool)
        .await
        .unwrap();

        let grant = repo.acquire(bus, None, "9", Some("lk_b".into())).await.unwrap();
        assert_eq!(grant.lock_id, "lk_b");

        let err = repo
            .owned_lock_ids(bus, None, &[SeatKey::parse("9", 50).unwrap()], "lk_a")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LockExpired(_)));
    }

    #[tokio::test]
    async fn test_legacy_spelling_is_the_same_seat() {
        let (_db, repo, bus) = seeded().await;

        repo.acquire(bus, None, "D8", Some("lk_a".into())).await.unwrap();
        let b = repo.acquire(bus, None, "38", Some("lk_b".into())).await;
        assert!(matches!(b, Err(StoreError::SeatAlreadyLocked(_))));
    }

    #[tokio::test]
    async fn test_booked_seat_cannot_be_locked() {
        let (db, repo, bus) = seeded().await;

        sqlx::query(
            "INSERT INTO passengers (first_name, last_name, created_at) \
             VALUES ('Ama', 'Mensah', '2026-01-01T00:00:00Z')",
        )
        .execute(&db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO bookings \
                 (passenger_id, bus_id, seat_number, price_paid, status, external_ref, created_at) \
             VALUES (1, ?, '12', 80.0, 'confirmed', 'R-1', '2026-01-01T00:00:00Z')",
        )
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        let err = repo.acquire(bus, None, "12", None).await.unwrap_err();
        assert!(matches!(err, StoreError::SeatAlreadyBooked(s) if s == "12"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_owner_scoped() {
        let (_db, repo, bus) = seeded().await;

        repo.acquire(bus, None, "4", Some("lk_a".into())).await.unwrap();

        // Wrong owner releases nothing.
        repo.release(bus, None, "4", "lk_b").await.unwrap();
        let b = repo.acquire(bus, None, "4", Some("lk_b".into())).await;
        assert!(matches!(b, Err(StoreError::SeatAlreadyLocked(_))));

        // Right owner frees it; releasing again is a no-op.
        repo.release(bus, None, "4", "lk_a").await.unwrap();
        repo.release(bus, None, "4", "lk_a").await.unwrap();
        assert!(repo.acquire(bus, None, "4", Some("lk_b".into())).await.is_ok());
    }

    #[tokio::test]
    async fn test_trip_supersedes_null_mode_holds() {
        let (db, repo, bus) = seeded().await;

        repo.acquire(bus, None, "3", Some("lk_old".into())).await.unwrap();

        let trips = TripRepository::new(db.pool.clone());
        let trip = trips.create(1, bus, None, None, None).await.unwrap();

        // The stale null-trip hold must not block the trip's namespace.
        let grant = repo
            .acquire(bus, Some(&trip), "3", Some("lk_new".into()))
            .await
            .unwrap();
        assert_eq!(grant.trip_id, Some(trip.id));
    }

    #[tokio::test]
    async fn test_seat_map_sets() {
        let (db, repo, bus) = seeded().await;

        sqlx::query(
            "INSERT INTO passengers (first_name, last_name, created_at) \
             VALUES ('Ama', 'Mensah', '2026-01-01T00:00:00Z')",
        )
        .execute(&db.pool)
        .await
        .unwrap();
        // One booking in a legacy spelling, to prove dedup.
        sqlx::query(
            "INSERT INTO bookings \
                 (passenger_id, bus_id, seat_number, price_paid, status, external_ref, created_at) \
             VALUES (1, ?, 'A2', 80.0, 'confirmed', 'R-2', '2026-01-01T00:00:00Z')",
        )
        .bind(bus)
        .execute(&db.pool)
        .await
        .unwrap();

        repo.acquire(bus, None, "10", Some("lk_me".into())).await.unwrap();
        repo.acquire(bus, None, "11", Some("lk_other".into())).await.unwrap();

        let map = repo.seat_map(bus, None, Some("lk_me")).await.unwrap();
        assert_eq!(map.booked, vec!["2"]);
        assert_eq!(map.locked, vec!["11"]);
        assert_eq!(map.own_locked, vec!["10"]);
        assert!(map.available.contains(&"10".to_string()));
        assert!(!map.available.contains(&"11".to_string()));
        assert!(!map.available.contains(&"2".to_string()));
        assert_eq!(map.available.len(), 48);
    }
}
