use std::net::SocketAddr;
use std::sync::Arc;

use elite_api::{app, AppState};
use elite_gateway::paystack::PaystackClient;
use elite_gateway::receipts::GasReceiptClient;
use elite_gateway::sms::ArkeselClient;
use elite_store::app_config::Settings;
use elite_store::DbClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elite_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().expect("Failed to load config");
    tracing::info!("Starting booking API on port {}", settings.server.port);

    let db = DbClient::connect(&settings.database.url)
        .await
        .expect("Failed to open database");
    // Schema bootstrap is deferred to the first request, behind the
    // one-shot latch.

    let payments = PaystackClient::new(settings.paystack_secret_key.clone());
    let sms = ArkeselClient::new(
        settings.arkesel_api_key.clone(),
        settings.arkesel_sender_id.clone(),
    );
    let receipts = GasReceiptClient::new(settings.gas_webhook_url.clone());

    let port = settings.server.port;
    let state = AppState::new(
        db,
        Arc::new(settings),
        Arc::new(payments),
        Arc::new(sms),
        Arc::new(receipts),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
