use elite_domain::trip::{Bus, Route};
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;

use crate::error::StoreError;

pub struct CatalogRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct BusRow {
    id: i64,
    route_id: Option<i64>,
    name: String,
    plate_number: Option<String>,
    capacity: i64,
    available_seats: i64,
    price: f64,
    route_text: Option<String>,
}

const BUS_COLUMNS: &str =
    "id, route_id, name, plate_number, capacity, available_seats, price, route_text";

fn into_bus(row: BusRow) -> Bus {
    Bus {
        id: row.id,
        route_id: row.route_id,
        name: row.name,
        plate_number: row.plate_number,
        capacity: row.capacity,
        available_seats: row.available_seats,
        price: row.price,
        route_text: row.route_text,
    }
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_bus(&self, bus_id: i64) -> Result<Option<Bus>, StoreError> {
        let row: Option<BusRow> =
            sqlx::query_as(&format!("SELECT {BUS_COLUMNS} FROM buses WHERE id = ?"))
                .bind(bus_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(into_bus))
    }

    pub async fn list_buses(&self) -> Result<Vec<Bus>, StoreError> {
        let rows: Vec<BusRow> =
            sqlx::query_as(&format!("SELECT {BUS_COLUMNS} FROM buses ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(into_bus).collect())
    }

    pub async fn list_routes(&self) -> Result<Vec<Route>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct RouteRow {
            id: i64,
            group_id: i64,
            name: String,
            description: Option<String>,
        }

        let rows: Vec<RouteRow> =
            sqlx::query_as("SELECT id, group_id, name, description FROM routes ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| Route {
                id: row.id,
                group_id: row.group_id,
                name: row.name,
                description: row.description,
            })
            .collect())
    }

    pub async fn create_bus(
        &self,
        route_id: i64,
        name: &str,
        plate_number: Option<&str>,
        capacity: i64,
        available_seats: Option<i64>,
        price: f64,
        route_text: Option<&str>,
    ) -> Result<Bus, StoreError> {
        let route_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM routes WHERE id = ?")
            .bind(route_id)
            .fetch_optional(&self.pool)
            .await?;
        if route_exists.is_none() {
            return Err(StoreError::RouteNotFound(route_id));
        }

        let available = available_seats.unwrap_or(capacity).clamp(0, capacity);

        let result = sqlx::query(
            "INSERT INTO buses \
                 (route_id, name, plate_number, capacity, available_seats, price, route_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(route_id)
        .bind(name)
        .bind(plate_number)
        .bind(capacity)
        .bind(available)
        .bind(price)
        .bind(route_text)
        .execute(&self.pool)
        .await?;

        self.get_bus(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    /// The public catalog: route groups keyed by their short key, each
    /// carrying its routes and their buses. A bus with an active trip shows
    /// the trip's id, price, and departure; otherwise the bus row's own
    /// price stands in (trip-null mode). Seat counts are computed live from
    /// confirmed bookings, not from the cached hint.
    pub async fn grouped_routes(&self) -> Result<Value, StoreError> {
        #[derive(sqlx::FromRow)]
        struct ListingRow {
            group_key: String,
            route_id: i64,
            route_name: String,
            route_description: Option<String>,
            bus_id: Option<i64>,
            bus_name: Option<String>,
            plate_number: Option<String>,
            capacity: Option<i64>,
            bus_price: Option<f64>,
            route_text: Option<String>,
            trip_id: Option<i64>,
            trip_price: Option<f64>,
            departure_date: Option<String>,
            departure_time: Option<String>,
            booked_count: i64,
        }

        let rows: Vec<ListingRow> = sqlx::query_as(
            "SELECT g.key AS group_key, \
                    r.id AS route_id, r.name AS route_name, \
                    r.description AS route_description, \
                    b.id AS bus_id, b.name AS bus_name, b.plate_number, b.capacity, \
                    b.price AS bus_price, b.route_text, \
                    t.id AS trip_id, t.price AS trip_price, \
                    t.departure_date, t.departure_time, \
                    (SELECT COUNT(*) FROM bookings bk \
                     WHERE bk.bus_id = b.id \
                       AND COALESCE(bk.trip_id, -1) = COALESCE(t.id, -1) \
                       AND bk.status = 'confirmed') AS booked_count \
             FROM route_groups g \
             JOIN routes r ON r.group_id = g.id \
             LEFT JOIN buses b ON b.route_id = r.id \
             LEFT JOIN trip_schedules t ON t.bus_id = b.id AND t.status = 'active' \
             ORDER BY g.key, r.id, b.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut groups: Map<String, Value> = Map::new();

        for row in rows {
            let group = groups
                .entry(row.group_key.clone())
                .or_insert_with(|| json!([]));
            let routes = group.as_array_mut().expect("groups hold route arrays");

            if !routes.iter().any(|r| r["id"] == json!(row.route_id)) {
                routes.push(json!({
                    "id": row.route_id,
                    "name": row.route_name,
                    "description": row.route_description,
                    "buses": [],
                }));
            }
            let route = routes
                .iter_mut()
                .find(|r| r["id"] == json!(row.route_id))
                .expect("route was just ensured");

            let Some(bus_id) = row.bus_id else {
                continue;
            };

            let capacity = row.capacity.unwrap_or(0);
            let mut bus = json!({
                "id": bus_id,
                "name": row.bus_name,
                "plate_number": row.plate_number,
                "capacity": capacity,
                "availableSeats": (capacity - row.booked_count).max(0),
                "price": row.trip_price.or(row.bus_price),
                "route": row.route_text.unwrap_or(row.route_name),
            });
            if let Some(trip_id) = row.trip_id {
                bus["tripId"] = json!(trip_id);
                bus["departure_date"] = json!(row.departure_date);
                bus["departure_time"] = json!(row.departure_time);
            }

            route["buses"]
                .as_array_mut()
                .expect("route buses is an array")
                .push(bus);
        }

        Ok(Value::Object(groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbClient;

    async fn seeded() -> (DbClient, CatalogRepository) {
        let db = DbClient::in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();

        sqlx::query("INSERT INTO route_groups (key, name) VALUES ('north', 'Northern routes')")
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO routes (group_id, name) VALUES (1, 'Accra - Tamale')")
            .execute(&db.pool)
            .await
            .unwrap();

        let repo = CatalogRepository::new(db.pool.clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_create_bus_clamps_available_seats() {
        let (_db, repo) = seeded().await;

        let bus = repo
            .create_bus(1, "Fleet 1", Some("GR-1-24"), 50, Some(80), 120.0, None)
            .await
            .unwrap();
        assert_eq!(bus.available_seats, 50);

        let bus = repo
            .create_bus(1, "Fleet 2", None, 50, Some(-3), 120.0, None)
            .await
            .unwrap();
        assert_eq!(bus.available_seats, 0);
    }

    #[tokio::test]
    async fn test_create_bus_requires_route() {
        let (_db, repo) = seeded().await;

        let err = repo
            .create_bus(99, "Fleet X", None, 50, None, 120.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RouteNotFound(99)));
    }

    #[tokio::test]
    async fn test_grouped_routes_prefers_trip_price() {
        let (db, repo) = seeded().await;

        repo.create_bus(1, "Fleet 1", None, 50, None, 120.0, Some("Accra to Tamale"))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO trip_schedules \
                 (route_id, bus_id, departure_date, departure_time, price, status) \
             VALUES (1, 1, '2026-09-01', '06:30', 150.0, 'active')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let catalog = repo.grouped_routes().await.unwrap();
        let bus = &catalog["north"][0]["buses"][0];
        assert_eq!(bus["tripId"], 1);
        assert_eq!(bus["price"], 150.0);
        assert_eq!(bus["departure_date"], "2026-09-01");
        assert_eq!(bus["availableSeats"], 50);
        assert_eq!(bus["route"], "Accra to Tamale");
    }

    #[tokio::test]
    async fn test_grouped_routes_null_trip_mode() {
        let (_db, repo) = seeded().await;

        repo.create_bus(1, "Fleet 1", None, 50, None, 120.0, None)
            .await
            .unwrap();

        let catalog = repo.grouped_routes().await.unwrap();
        let bus = &catalog["north"][0]["buses"][0];
        assert_eq!(bus["price"], 120.0);
        assert!(bus.get("tripId").is_none());
        assert_eq!(bus["route"], "Accra - Tamale");
    }
}
