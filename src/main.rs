use std::sync::{Arc, Mutex};
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use carhire::clock::{Clock, SystemClock};
use carhire::config::AppConfig;
use carhire::db;
use carhire::handlers;
use carhire::services::lifecycle;
use carhire::services::payments::paystack::PaystackGateway;
use carhire::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.paystack_secret_key.is_empty() {
        tracing::warn!("PAYSTACK_SECRET_KEY is not set, payment initialization will fail");
    }
    if config.paystack_webhook_secret.is_empty() {
        tracing::warn!("PAYSTACK_WEBHOOK_SECRET is not set, all webhooks will be rejected");
    }
    let gateway = PaystackGateway::new(
        config.paystack_secret_key.clone(),
        config.paystack_webhook_secret.clone(),
        config.paystack_base_url.clone(),
        config.payment_currency.clone(),
        Duration::from_secs(config.gateway_timeout_secs),
    )?;
    tracing::info!("using Paystack gateway (url: {})", config.paystack_base_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
        clock,
    });

    if config.sweep_interval_secs > 0 {
        tokio::spawn(run_sweeper(
            Arc::clone(&state),
            Duration::from_secs(config.sweep_interval_secs),
        ));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically moves bookings along with the clock and refreshes the fleet's
/// availability flags.
async fn run_sweeper(state: Arc<AppState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    tracing::info!(interval_secs = period.as_secs(), "booking sweeper started");

    loop {
        interval.tick().await;

        let now = state.now();
        let result = state
            .db()
            .and_then(|mut db| lifecycle::sweep(&mut db, &now));
        if let Err(e) = result {
            tracing::error!(error = %e, "booking sweep failed");
        }
    }
}
