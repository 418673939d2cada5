pub mod admin;
pub mod bookings;
pub mod health;
pub mod licenses;
pub mod locations;
pub mod payments;
pub mod users;
pub mod vehicles;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/users", post(users::create_user))
        .route("/api/users/:id/dashboard", get(users::get_dashboard))
        .route("/api/owners/:owner_id/vehicles", get(vehicles::list_owner_vehicles))
        .route("/api/owners/:owner_id/bookings", get(bookings::list_owner_bookings))
        .route("/api/locations", get(locations::list_locations))
        .route("/api/vehicles", get(vehicles::search_vehicles).post(vehicles::create_vehicle))
        .route("/api/vehicles/:id", get(vehicles::get_vehicle).put(vehicles::update_vehicle))
        .route("/api/licenses", post(licenses::upload_license))
        .route("/api/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/api/bookings/:booking_id", get(bookings::get_booking))
        .route("/api/bookings/:booking_id/payment", post(bookings::start_payment))
        .route("/api/bookings/:booking_id/receipt", get(bookings::get_receipt))
        .route("/payments/callback", get(payments::payment_callback))
        .route("/payments/webhook", post(payments::payment_webhook))
        .route("/api/admin/status", get(admin::get_status))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route(
            "/api/admin/bookings/:booking_id/cancel",
            post(admin::cancel_booking),
        )
        .route("/api/admin/vehicles", get(admin::list_vehicles))
        .route("/api/admin/licenses", get(admin::list_licenses))
        .route("/api/admin/vehicles/:id/review", post(admin::review_vehicle))
        .route("/api/admin/licenses/:id/review", post(admin::review_license))
        .route("/api/admin/locations", post(locations::create_location))
        .route("/api/admin/sweep", post(admin::run_sweep))
        .with_state(state)
}

/// Maps a unique-constraint failure to a validation error; anything else
/// stays internal.
pub(crate) fn on_conflict(err: anyhow::Error, message: &str) -> AppError {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            AppError::validation(message)
        }
        _ => AppError::Internal(err),
    }
}
