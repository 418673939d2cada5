use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub public_base_url: String,
    pub paystack_secret_key: String,
    pub paystack_webhook_secret: String,
    pub paystack_base_url: String,
    pub payment_currency: String,
    pub chauffeur_daily_rate: Decimal,
    pub min_self_drive_experience_years: i64,
    pub gateway_timeout_secs: u64,
    /// 0 disables the background sweep.
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "carhire.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY").unwrap_or_default(),
            paystack_webhook_secret: env::var("PAYSTACK_WEBHOOK_SECRET").unwrap_or_default(),
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "KES".to_string()),
            chauffeur_daily_rate: env::var("CHAUFFEUR_DAILY_RATE")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok())
                .unwrap_or_else(|| Decimal::from(1000)),
            min_self_drive_experience_years: env::var("MIN_SELF_DRIVE_EXPERIENCE_YEARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }

    /// Where the payment provider sends the client back after checkout.
    pub fn callback_url(&self, booking_id: &str) -> String {
        format!(
            "{}/payments/callback?booking_id={booking_id}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}
