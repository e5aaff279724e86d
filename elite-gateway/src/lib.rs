pub mod paystack;
pub mod receipts;
pub mod signature;
pub mod sms;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rejected by provider: {0}")]
    Rejected(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}
