//! SMS gateway client.

use async_trait::async_trait;
use serde_json::json;

use crate::GatewayError;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<(), GatewayError>;
}

#[derive(Clone)]
pub struct ArkeselClient {
    client: reqwest::Client,
    api_key: Option<String>,
    sender_id: String,
    base_url: String,
}

impl ArkeselClient {
    pub fn new(api_key: Option<String>, sender_id: impl Into<String>) -> Self {
        Self::with_base_url(api_key, sender_id, "https://sms.arkesel.com")
    }

    pub fn with_base_url(
        api_key: Option<String>,
        sender_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            sender_id: sender_id.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SmsSender for ArkeselClient {
    async fn send(&self, to: &str, message: &str) -> Result<(), GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("ARKESEL_API_KEY"))?;

        let url = format!("{}/api/v2/sms/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&json!({
                "sender": self.sender_id,
                "message": message,
                "recipients": [to],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "sms send failed");
            return Err(GatewayError::Rejected(format!("sms returned HTTP {status}")));
        }

        tracing::info!(to, "sms dispatched");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub message: String,
}

/// Recording sender for tests.
#[derive(Default)]
pub struct MockSmsSender {
    pub sent: std::sync::Mutex<Vec<SentSms>>,
}

impl MockSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl SmsSender for MockSmsSender {
    async fn send(&self, to: &str, message: &str) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(SentSms {
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
