//! Payment provider abstraction.
//!
//! The rest of the crate only talks to [`PaymentGateway`]; the Paystack client
//! is one implementation and tests substitute their own.

pub mod paystack;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha512;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider timed out")]
    Timeout,

    #[error("could not reach payment provider: {0}")]
    Transport(String),

    #[error("payment provider rejected the request: {0}")]
    Provider(String),

    #[error("unexpected response from payment provider: {0}")]
    InvalidResponse(String),

    #[error("invalid payment request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Whether the same call may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Transport(_))
    }
}

#[derive(Debug, Clone)]
pub struct InitializeRequest {
    pub email: String,
    /// Major currency units; implementations convert as their API requires.
    pub amount: Decimal,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct InitializedTransaction {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Reversed,
    /// Still in flight (`ongoing`, `pending`, `queued`, ...).
    InProgress(String),
}

impl TransactionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => TransactionStatus::Success,
            "failed" => TransactionStatus::Failed,
            "abandoned" => TransactionStatus::Abandoned,
            "reversed" => TransactionStatus::Reversed,
            other => TransactionStatus::InProgress(other.to_string()),
        }
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed | TransactionStatus::Abandoned | TransactionStatus::Reversed
        )
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: TransactionStatus,
    pub transaction_id: Option<String>,
    /// Provider's human-readable outcome, e.g. "Approved" or "Declined".
    pub gateway_response: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializedTransaction, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;

    /// Checks an inbound notification against its signature header. Must be
    /// given the raw body exactly as received.
    fn authenticate_notification(&self, raw_body: &[u8], signature: &str) -> bool;
}

/// Hex-encoded HMAC-SHA512 of `body` under `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha512>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex HMAC-SHA512 signature. An empty secret never
/// authenticates anything.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        tracing::warn!("webhook secret not configured, rejecting notification");
        return false;
    }

    let provided = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match Hmac::<Sha512>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Transaction id as a string whether the provider sent a number or a string.
pub(crate) fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
