use std::sync::Arc;

use elite_gateway::paystack::PaymentVerifier;
use elite_gateway::receipts::ReceiptService;
use elite_gateway::sms::SmsSender;
use elite_store::app_config::Settings;
use elite_store::{
    BookingRepository, CatalogRepository, DbClient, SeatRepository, TripRepository, UserRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub settings: Arc<Settings>,
    pub catalog: Arc<CatalogRepository>,
    pub trips: Arc<TripRepository>,
    pub seats: Arc<SeatRepository>,
    pub bookings: Arc<BookingRepository>,
    pub users: Arc<UserRepository>,
    pub payments: Arc<dyn PaymentVerifier>,
    pub sms: Arc<dyn SmsSender>,
    pub receipts: Arc<dyn ReceiptService>,
}

impl AppState {
    pub fn new(
        db: DbClient,
        settings: Arc<Settings>,
        payments: Arc<dyn PaymentVerifier>,
        sms: Arc<dyn SmsSender>,
        receipts: Arc<dyn ReceiptService>,
    ) -> Self {
        let pool = db.pool.clone();
        Self {
            db,
            settings,
            catalog: Arc::new(CatalogRepository::new(pool.clone())),
            trips: Arc::new(TripRepository::new(pool.clone())),
            seats: Arc::new(SeatRepository::new(pool.clone())),
            bookings: Arc::new(BookingRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool)),
            payments,
            sms,
            receipts,
        }
    }
}
