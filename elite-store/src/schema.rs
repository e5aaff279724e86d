//! Idempotent schema bootstrap.
//!
//! The store predates trip awareness: `bookings` and `seat_locks` may exist
//! without a `trip_id` column, so after creating anything missing the
//! bootstrap introspects both tables and patches the column in. Everything
//! here is safe to re-run.

use sqlx::SqlitePool;
use tracing::info;

const BASE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS route_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS routes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL REFERENCES route_groups(id),
        name TEXT NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS buses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        route_id INTEGER REFERENCES routes(id),
        name TEXT NOT NULL,
        plate_number TEXT,
        capacity INTEGER NOT NULL DEFAULT 50,
        available_seats INTEGER NOT NULL DEFAULT 50,
        price REAL NOT NULL DEFAULT 0,
        route_text TEXT
    )",
    "CREATE TABLE IF NOT EXISTS passengers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        nok_name TEXT,
        nok_phone TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT,
        password_hash TEXT,
        google_id TEXT,
        picture_url TEXT,
        auth_method TEXT NOT NULL DEFAULT 'email',
        verified INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS auth_sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS bookings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passenger_id INTEGER NOT NULL REFERENCES passengers(id),
        bus_id INTEGER NOT NULL REFERENCES buses(id),
        seat_number TEXT NOT NULL,
        price_paid REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        external_ref TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS seat_locks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bus_id INTEGER NOT NULL REFERENCES buses(id),
        seat_number TEXT NOT NULL,
        locked_by TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    )",
];

const TRIP_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS trip_schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        route_id INTEGER NOT NULL REFERENCES routes(id),
        bus_id INTEGER NOT NULL REFERENCES buses(id),
        departure_date TEXT,
        departure_time TEXT,
        price REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        started_at TEXT,
        ended_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_trip_schedules_status ON trip_schedules(status)",
    "CREATE INDEX IF NOT EXISTS idx_trip_schedules_route_id ON trip_schedules(route_id)",
    "CREATE INDEX IF NOT EXISTS idx_trip_schedules_bus_id ON trip_schedules(bus_id)",
    "CREATE TABLE IF NOT EXISTS booking_receipts (
        booking_id INTEGER PRIMARY KEY REFERENCES bookings(id),
        receipt_url TEXT NOT NULL,
        drive_file_id TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_bookings_external_ref ON bookings(external_ref)",
    "CREATE INDEX IF NOT EXISTS idx_seat_locks_bus_seat ON seat_locks(bus_id, seat_number)",
];

pub(crate) async fn bootstrap(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in BASE_TABLES.iter().chain(TRIP_TABLES) {
        sqlx::query(statement).execute(pool).await?;
    }

    ensure_trip_id_column(pool, "bookings").await?;
    ensure_trip_id_column(pool, "seat_locks").await?;

    info!("schema bootstrap complete");
    Ok(())
}

async fn ensure_trip_id_column(pool: &SqlitePool, table: &str) -> Result<(), sqlx::Error> {
    let present: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = 'trip_id'"
    ))
    .fetch_one(pool)
    .await?;

    if present == 0 {
        info!(table, "adding trip_id column");
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN trip_id INTEGER"))
            .execute(pool)
            .await?;
    }

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_trip_id ON {table}(trip_id)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::database::DbClient;

    async fn column_names(db: &DbClient, table: &str) -> Vec<String> {
        sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .fetch_all(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_adds_trip_columns() {
        let db = DbClient::in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();

        for table in ["bookings", "seat_locks"] {
            let cols = column_names(&db, table).await;
            assert!(cols.contains(&"trip_id".to_string()), "{table}: {cols:?}");
        }
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let db = DbClient::in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();
        db.ensure_schema().await.unwrap();

        // A second client over the same pool re-runs the bootstrap from
        // scratch; existing tables must survive it.
        let again = DbClient::from_pool(db.pool.clone());
        again.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_patches_pre_trip_tables() {
        let db = DbClient::in_memory().await.unwrap();

        // A store written before trip awareness: bookings without trip_id.
        sqlx::query(
            "CREATE TABLE bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                passenger_id INTEGER NOT NULL,
                bus_id INTEGER NOT NULL,
                seat_number TEXT NOT NULL,
                price_paid REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                external_ref TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        db.ensure_schema().await.unwrap();

        let cols = column_names(&db, "bookings").await;
        assert!(cols.contains(&"trip_id".to_string()));
    }
}
