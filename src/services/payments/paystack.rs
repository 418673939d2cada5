use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{
    json_id, verify_signature, GatewayError, InitializeRequest, InitializedTransaction,
    PaymentGateway, TransactionStatus, VerifiedTransaction,
};

const REFERENCE_PREFIX: &str = "CARHIRE_";

pub struct PaystackGateway {
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    currency: String,
    client: reqwest::Client,
}

impl PaystackGateway {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        base_url: String,
        currency: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Paystack HTTP client")?;

        Ok(Self {
            secret_key,
            webhook_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
            client,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, GatewayError> {
        let resp = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(e) => e,
            Err(_) if !status.is_success() => {
                return Err(GatewayError::Provider(format!("HTTP {status}")));
            }
            Err(e) => return Err(GatewayError::InvalidResponse(e.to_string())),
        };

        if !status.is_success() || !envelope.status {
            let message = if envelope.message.is_empty() {
                format!("HTTP {status}")
            } else {
                envelope.message
            };
            return Err(GatewayError::Provider(message));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data in response".to_string()))
    }

    /// The reference arrives from a query string, so it is pushed as an
    /// encoded path segment rather than formatted into the URL.
    fn verify_url(&self, reference: &str) -> Result<reqwest::Url, GatewayError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid Paystack base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidRequest("Paystack base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["transaction", "verify", reference]);
        Ok(url)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    #[serde(default)]
    reference: Option<String>,
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

pub fn new_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{REFERENCE_PREFIX}{}", &id[..12])
}

/// Paystack amounts are integers in the currency's minor unit.
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    if amount <= Decimal::ZERO {
        return Err(GatewayError::InvalidRequest("amount must be positive".to_string()));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidRequest(format!("amount out of range: {amount}")))
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializedTransaction, GatewayError> {
        let reference = new_reference();
        let body = json!({
            "email": request.email,
            "amount": to_minor_units(request.amount)?,
            "currency": self.currency,
            "callback_url": request.callback_url,
            "reference": reference,
            "metadata": request.metadata,
        });

        let url = format!("{}/transaction/initialize", self.base_url);
        let data: InitializeData = self.send(self.client.post(&url).json(&body)).await?;

        tracing::info!(reference = %reference, "Paystack transaction initialized");

        Ok(InitializedTransaction {
            reference: data.reference.unwrap_or(reference),
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let url = self.verify_url(reference)?;
        let data: serde_json::Value = self.send(self.client.get(url)).await?;

        let status = data["status"]
            .as_str()
            .map(TransactionStatus::parse)
            .ok_or_else(|| GatewayError::InvalidResponse("missing transaction status".to_string()))?;

        Ok(VerifiedTransaction {
            reference: data["reference"].as_str().unwrap_or(reference).to_string(),
            status,
            transaction_id: json_id(&data["id"]),
            gateway_response: data["gateway_response"].as_str().map(|s| s.to_string()),
            raw: data,
        })
    }

    fn authenticate_notification(&self, raw_body: &[u8], signature: &str) -> bool {
        verify_signature(&self.webhook_secret, raw_body, signature)
    }
}
