//! Payment initiation and provider-driven settlement.
//!
//! Gateway calls are awaited with the database unlocked; the synchronous
//! phases either side of them each take the lock once.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Payment, PaymentStatus, Vehicle};
use crate::services::availability;
use crate::services::payments::{InitializeRequest, InitializedTransaction, TransactionStatus, VerifiedTransaction};
use crate::services::reconciler::{self, EventSource, PaymentEvent, PaymentOutcome, ReconcileOutcome};
use crate::state::AppState;

#[derive(Debug)]
pub struct PaymentIntent {
    pub booking: Booking,
    pub vehicle: Vehicle,
    pub payment: Payment,
}

#[derive(Debug, Serialize)]
pub struct PaymentStarted {
    pub booking_id: String,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub amount: Decimal,
}

/// Loads a pending booking and its payment row, creating the row on first use.
/// A booking whose dates have since been taken is refused before any money
/// moves.
pub fn prepare_payment(conn: &Connection, booking_id: &str, now: &NaiveDateTime) -> Result<PaymentIntent, AppError> {
    let booking = queries::get_booking_by_public_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.status != BookingStatus::Pending {
        return Err(AppError::InvalidTransition(format!(
            "booking is {}, not awaiting payment",
            booking.status
        )));
    }

    let vehicle = queries::get_vehicle(conn, booking.vehicle_id)?
        .ok_or_else(|| AppError::NotFound(format!("vehicle {}", booking.vehicle_id)))?;
    if !availability::check_dates(conn, &vehicle, &booking.start_date, &booking.end_date, Some(booking.id))? {
        return Err(AppError::validation("vehicle is no longer available for these dates"));
    }

    let client = queries::get_user(conn, &booking.client_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", booking.client_id)))?;
    if client.email.is_empty() {
        return Err(AppError::validation("an email address is required to pay"));
    }

    let payment = queries::get_or_create_payment(conn, &booking, &client.email, &client.phone_number, now)?;
    match payment.status {
        PaymentStatus::Completed => Err(AppError::InvalidTransition("booking is already paid".to_string())),
        PaymentStatus::Cancelled => Err(AppError::InvalidTransition("payment was cancelled".to_string())),
        _ => Ok(PaymentIntent { booking, vehicle, payment }),
    }
}

pub fn record_initialized(conn: &Connection, payment_id: i64, tx: &InitializedTransaction) -> Result<(), AppError> {
    if !queries::attach_payment_reference(conn, payment_id, &tx.reference, &tx.access_code)? {
        return Err(AppError::InvalidTransition("payment is no longer open".to_string()));
    }
    Ok(())
}

/// Translates a provider verification into a reconciler event. Transactions
/// still in flight produce no event.
pub fn event_from_verification(verified: &VerifiedTransaction, source: EventSource) -> Option<PaymentEvent> {
    let outcome = match &verified.status {
        TransactionStatus::Success => PaymentOutcome::Success {
            transaction_id: verified.transaction_id.clone(),
            raw: verified.raw.clone(),
        },
        status if status.is_terminal_failure() => PaymentOutcome::Failure {
            reason: verified
                .gateway_response
                .clone()
                .unwrap_or_else(|| "payment was not completed".to_string()),
            raw: verified.raw.clone(),
        },
        _ => return None,
    };

    Some(PaymentEvent {
        reference: verified.reference.clone(),
        source,
        outcome,
    })
}

pub async fn start_payment(state: &AppState, booking_id: &str) -> Result<PaymentStarted, AppError> {
    let now = state.now();
    let intent = {
        let db = state.db()?;
        prepare_payment(&db, booking_id, &now)?
    };

    let request = InitializeRequest {
        email: intent.payment.email.clone(),
        amount: intent.payment.amount,
        callback_url: state.config.callback_url(&intent.booking.booking_id),
        metadata: json!({
            "booking_id": intent.booking.booking_id,
            "vehicle_id": intent.booking.vehicle_id,
            "vehicle": intent.vehicle.display_name(),
            "client_id": intent.booking.client_id,
            "total_days": intent.booking.total_days,
        }),
    };

    let tx = state.gateway.initialize(request).await.map_err(|e| {
        tracing::warn!(booking_id, error = %e, retryable = e.is_retryable(), "payment initialization failed");
        e
    })?;

    {
        let db = state.db()?;
        record_initialized(&db, intent.payment.id, &tx)?;
    }

    tracing::info!(booking_id, reference = %tx.reference, amount = %intent.payment.amount, "payment initialized");

    Ok(PaymentStarted {
        booking_id: intent.booking.booking_id,
        reference: tx.reference,
        authorization_url: tx.authorization_url,
        access_code: tx.access_code,
        amount: intent.payment.amount,
    })
}

/// Asks the provider for the authoritative status of `reference` and applies
/// it. `None` means the transaction is still in flight.
pub async fn verify_and_reconcile(
    state: &AppState,
    reference: &str,
    source: EventSource,
) -> Result<Option<ReconcileOutcome>, AppError> {
    let verified = state.gateway.verify(reference).await.map_err(|e| {
        tracing::warn!(reference, error = %e, retryable = e.is_retryable(), "payment verification failed");
        e
    })?;

    let Some(event) = event_from_verification(&verified, source) else {
        tracing::info!(reference, status = ?verified.status, "payment still in progress");
        return Ok(None);
    };

    let now = state.now();
    let mut db = state.db()?;
    let outcome = reconciler::reconcile(&mut db, &now, &event)?;
    Ok(Some(outcome))
}
