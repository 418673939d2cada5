//! Applies payment gateway outcomes to a payment and its booking.
//!
//! The callback and the webhook both land here and may arrive in either order,
//! any number of times. Every write is a compare-and-set inside one IMMEDIATE
//! transaction, so the first success wins and the rest are no-ops.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, PaymentStatus};
use crate::services::availability;
use crate::services::lifecycle::{self, Confirmation, StatusChange};

pub const CONFLICT_REASON: &str = "vehicle no longer available; refund required";
pub const CANCELLED_REASON: &str = "booking was cancelled; refund required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Callback,
    Webhook,
}

#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Success {
        transaction_id: Option<String>,
        raw: serde_json::Value,
    },
    Failure {
        reason: String,
        raw: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub reference: String,
    pub source: EventSource,
    pub outcome: PaymentOutcome,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Payment completed by this event. Carries the booking change when the
    /// booking was still pending.
    Completed(Option<StatusChange>),
    AlreadyCompleted,
    Failed,
    /// A failure for a payment that is not open; nothing changed.
    Ignored,
    /// No payment carries this reference.
    Unknown,
    /// Paid, but the booking can no longer be honoured.
    Conflict,
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Completed(_) => "completed",
            ReconcileOutcome::AlreadyCompleted => "already_completed",
            ReconcileOutcome::Failed => "failed",
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Unknown => "unknown",
            ReconcileOutcome::Conflict => "conflict",
        }
    }
}

pub fn reconcile(
    conn: &mut Connection,
    now: &NaiveDateTime,
    event: &PaymentEvent,
) -> Result<ReconcileOutcome, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(payment) = queries::get_payment_by_reference(&tx, &event.reference)? else {
        tracing::warn!(
            reference = %event.reference,
            source = ?event.source,
            "payment event for unknown reference"
        );
        return Ok(ReconcileOutcome::Unknown);
    };

    let outcome = match &event.outcome {
        PaymentOutcome::Success { transaction_id, raw } => {
            if payment.status == PaymentStatus::Completed {
                ReconcileOutcome::AlreadyCompleted
            } else if payment.status == PaymentStatus::Cancelled {
                tracing::error!(
                    reference = %event.reference,
                    booking = payment.booking_id,
                    "payment succeeded after booking was cancelled, refund required"
                );
                ReconcileOutcome::Conflict
            } else {
                match lifecycle::confirm_booking(&tx, payment.booking_id, now)? {
                    Confirmation::Confirmed(change) => {
                        complete(&tx, payment.id, &event.reference, transaction_id.as_deref(), raw, now)?;
                        availability::update_availability(&tx, change.vehicle_id, now)?;
                        ReconcileOutcome::Completed(Some(change))
                    }
                    Confirmation::AlreadyConfirmed => {
                        complete(&tx, payment.id, &event.reference, transaction_id.as_deref(), raw, now)?;
                        ReconcileOutcome::Completed(None)
                    }
                    Confirmation::Overlap => {
                        refuse(&tx, payment.id, payment.booking_id, CONFLICT_REASON, raw, now, true)?;
                        tracing::error!(
                            reference = %event.reference,
                            booking = payment.booking_id,
                            "payment succeeded but vehicle is already booked, refund required"
                        );
                        ReconcileOutcome::Conflict
                    }
                    Confirmation::Cancelled => {
                        refuse(&tx, payment.id, payment.booking_id, CANCELLED_REASON, raw, now, false)?;
                        tracing::error!(
                            reference = %event.reference,
                            booking = payment.booking_id,
                            "payment succeeded for a cancelled booking, refund required"
                        );
                        ReconcileOutcome::Conflict
                    }
                }
            }
        }
        PaymentOutcome::Failure { reason, raw } => {
            if payment.status == PaymentStatus::Completed {
                ReconcileOutcome::AlreadyCompleted
            } else if payment.reference.as_deref() != Some(event.reference.as_str()) {
                // An abandoned earlier checkout must not fail the current one.
                tracing::info!(
                    reference = %event.reference,
                    current = ?payment.reference,
                    "failure for a superseded reference"
                );
                ReconcileOutcome::Ignored
            } else if queries::fail_payment(
                &tx,
                payment.id,
                &[PaymentStatus::Pending, PaymentStatus::Processing],
                reason,
                Some(&raw.to_string()),
            )? {
                ReconcileOutcome::Failed
            } else {
                ReconcileOutcome::Ignored
            }
        }
    };

    tx.commit()?;

    tracing::info!(
        reference = %event.reference,
        source = ?event.source,
        outcome = outcome.label(),
        "payment event reconciled"
    );
    Ok(outcome)
}

fn complete(
    conn: &Connection,
    payment_id: i64,
    reference: &str,
    transaction_id: Option<&str>,
    raw: &serde_json::Value,
    now: &NaiveDateTime,
) -> Result<(), AppError> {
    // The payment was read inside this transaction and is not completed, so
    // the compare-and-set cannot lose.
    if !queries::complete_payment(conn, payment_id, reference, transaction_id, &raw.to_string(), now)? {
        return Err(AppError::Internal(anyhow::anyhow!(
            "payment {payment_id} changed state during reconciliation"
        )));
    }
    Ok(())
}

/// Records a success that cannot be honoured: the payment is failed with a
/// refund reason and a still-pending booking is cancelled. An earlier failure
/// reason is kept unless `overwrite_failed` is set.
fn refuse(
    conn: &Connection,
    payment_id: i64,
    booking_row_id: i64,
    reason: &str,
    raw: &serde_json::Value,
    now: &NaiveDateTime,
    overwrite_failed: bool,
) -> Result<(), AppError> {
    let from: &[PaymentStatus] = if overwrite_failed {
        &[PaymentStatus::Pending, PaymentStatus::Processing, PaymentStatus::Failed]
    } else {
        &[PaymentStatus::Pending, PaymentStatus::Processing]
    };
    queries::fail_payment(
        conn,
        payment_id,
        from,
        reason,
        Some(&raw.to_string()),
    )?;
    queries::transition_booking_status(
        conn,
        booking_row_id,
        &[BookingStatus::Pending],
        BookingStatus::Cancelled,
        now,
    )?;
    Ok(())
}
