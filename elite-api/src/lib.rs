use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod error;
pub mod middleware;
pub mod seats;
pub mod state;
pub mod users;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // The front-end is only one of several clients; the contract is open
    // CORS with bearer auth. Preflights are answered by the layer itself.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let user_routes = Router::new()
        .route("/api/user/profile", get(users::profile))
        .route("/api/user/bookings", get(users::bookings))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/fleet-options", get(admin::fleet_options))
        .route("/api/admin/buses", post(admin::create_bus))
        .route("/api/admin/trips", post(admin::create_trip))
        .route("/api/admin/trips/:trip_id/end", post(admin::end_trip))
        .route("/api/admin/manual-booking", post(admin::manual_booking))
        .route("/api/admin/upcoming-bookings", get(admin::upcoming_bookings))
        .route("/api/admin/dashboard", get(admin::dashboard))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .route("/api/routes", get(catalog::routes_listing))
        .route("/api/passengers", get(catalog::passengers))
        .route("/api/bus/:bus_id/seats", get(seats::seat_map))
        .route("/api/bus/:bus_id/lock-seat", post(seats::lock_seat))
        .route("/api/bus/:bus_id/unlock-seat", post(seats::unlock_seat))
        .route("/api/booking/confirm", post(bookings::confirm))
        .route("/api/paystack/webhook", post(webhooks::paystack))
        .route("/", post(webhooks::root_fallback))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/google", post(auth::google))
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/signout", post(auth::signout))
        .merge(user_routes)
        .merge(admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::ensure_schema,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
