//! Payment processor client.
//!
//! Server-to-server verification of a charge reference. The processor is
//! the source of truth for whether money actually moved; booking
//! finalization refuses to proceed on anything but a successful verify.

use async_trait::async_trait;
use serde::Deserialize;

use crate::GatewayError;

/// Outcome of a successful verify call.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    pub reference: String,
    pub status: String,
    /// Amount in the currency's minor unit (pesewas/kobo).
    pub amount_minor: i64,
    pub currency: Option<String>,
    pub paid_at: Option<String>,
}

impl VerifiedPayment {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Look up a transaction reference with the processor.
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError>;
}

#[derive(Clone)]
pub struct PaystackClient {
    client: reqwest::Client,
    secret_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyEnvelope {
    status: bool,
    message: Option<String>,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: i64,
    currency: Option<String>,
    paid_at: Option<String>,
}

impl PaystackClient {
    pub fn new(secret_key: Option<String>) -> Self {
        Self::with_base_url(secret_key, "https://api.paystack.co")
    }

    pub fn with_base_url(secret_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentVerifier for PaystackClient {
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("PAYSTACK_SECRET_KEY"))?;

        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = self.client.get(&url).bearer_auth(secret).send().await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, reference, "paystack verify response");

        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "verify returned HTTP {status}"
            )));
        }

        let envelope: VerifyEnvelope = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("verify body: {e}")))?;

        if !envelope.status {
            return Err(GatewayError::Rejected(
                envelope.message.unwrap_or_else(|| "verify failed".into()),
            ));
        }

        let data = envelope
            .data
            .ok_or_else(|| GatewayError::Malformed("verify body missing data".into()))?;

        Ok(VerifiedPayment {
            reference: data.reference,
            status: data.status,
            amount_minor: data.amount,
            currency: data.currency,
            paid_at: data.paid_at,
        })
    }
}

/// In-memory verifier for tests: preloaded references verify, everything
/// else is rejected the way the live processor rejects unknown references.
#[derive(Default)]
pub struct MockPaymentVerifier {
    payments: std::sync::Mutex<std::collections::HashMap<String, VerifiedPayment>>,
}

impl MockPaymentVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_success(self, reference: &str, amount_minor: i64) -> Self {
        self.insert(VerifiedPayment {
            reference: reference.to_string(),
            status: "success".to_string(),
            amount_minor,
            currency: Some("GHS".to_string()),
            paid_at: None,
        });
        self
    }

    pub fn insert(&self, payment: VerifiedPayment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.reference.clone(), payment);
    }
}

#[async_trait]
impl PaymentVerifier for MockPaymentVerifier {
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("unknown reference {reference}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_verifier_round_trip() {
        let verifier = MockPaymentVerifier::new().with_success("R1", 5000);

        let payment = verifier.verify("R1").await.unwrap();
        assert!(payment.is_success());
        assert_eq!(payment.amount_minor, 5000);

        assert!(verifier.verify("R2").await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = PaystackClient::new(None);
        let err = client.verify("R1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
    }
}
