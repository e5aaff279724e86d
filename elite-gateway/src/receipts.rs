//! Receipt side-effects service client.
//!
//! The generator sits behind a webhook URL, renders a PDF receipt, files it
//! in a drive folder, and mails the passenger. All of that is best-effort
//! from the booking engine's point of view.

use async_trait::async_trait;
use serde::Serialize;

use crate::GatewayError;

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRequest {
    pub booking_code: String,
    pub passenger_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub route_name: String,
    pub bus_name: String,
    pub seats: Vec<String>,
    pub amount: f64,
    pub reference: String,
    pub departure_date: Option<String>,
    pub departure_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReceiptDocument {
    pub receipt_url: String,
    pub drive_file_id: Option<String>,
}

#[async_trait]
pub trait ReceiptService: Send + Sync {
    async fn generate(&self, request: &ReceiptRequest) -> Result<ReceiptDocument, GatewayError>;
}

#[derive(Clone)]
pub struct GasReceiptClient {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl GasReceiptClient {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl ReceiptService for GasReceiptClient {
    async fn generate(&self, request: &ReceiptRequest) -> Result<ReceiptDocument, GatewayError> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or(GatewayError::NotConfigured("GAS_WEBHOOK_URL"))?;

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "receipt service returned HTTP {status}"
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("receipt body: {e}")))?;

        // The generator has answered with either `receipt_url` or `url`
        // across script revisions; accept both.
        let receipt_url = value["receipt_url"]
            .as_str()
            .or_else(|| value["url"].as_str())
            .ok_or_else(|| GatewayError::Malformed("receipt body missing url".into()))?
            .to_string();

        Ok(ReceiptDocument {
            receipt_url,
            drive_file_id: value["drive_file_id"].as_str().map(str::to_string),
        })
    }
}

/// Recording receipt generator for tests.
#[derive(Default)]
pub struct MockReceiptService {
    pub generated: std::sync::Mutex<Vec<ReceiptRequest>>,
    pub fail: bool,
}

impl MockReceiptService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn generated_count(&self) -> usize {
        self.generated.lock().unwrap().len()
    }
}

#[async_trait]
impl ReceiptService for MockReceiptService {
    async fn generate(&self, request: &ReceiptRequest) -> Result<ReceiptDocument, GatewayError> {
        if self.fail {
            return Err(GatewayError::Rejected("receipt generator down".into()));
        }
        self.generated.lock().unwrap().push(request.clone());
        Ok(ReceiptDocument {
            receipt_url: format!("https://receipts.example.com/{}.pdf", request.booking_code),
            drive_file_id: Some(format!("drive-{}", request.booking_code)),
        })
    }
}
