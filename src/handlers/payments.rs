use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, PaymentStatus};
use crate::services::checkout;
use crate::services::payments::json_id;
use crate::services::reconciler::{self, EventSource, PaymentEvent, PaymentOutcome};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

// GET /payments/callback?booking_id&reference
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub booking_id: String,
    pub reference: Option<String>,
    /// Paystack also sends the reference under this name.
    pub trxref: Option<String>,
}

#[derive(Serialize)]
pub struct CallbackResponse {
    pub booking_id: String,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub outcome: &'static str,
}

/// Where the client lands after checkout. The provider is asked for the
/// transaction's real status; the query string is never trusted on its own.
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    let reference = {
        let db = state.db()?;
        let booking = queries::get_booking_by_public_id(&db, &query.booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {}", query.booking_id)))?;
        let payment = queries::get_payment_for_booking(&db, booking.id)?
            .ok_or_else(|| AppError::NotFound(format!("payment for booking {}", query.booking_id)))?;

        let reference = query
            .reference
            .clone()
            .or_else(|| query.trxref.clone())
            .or(payment.reference)
            .ok_or_else(|| AppError::validation("no payment reference for this booking"))?;

        if let Some(other) = queries::get_payment_by_reference(&db, &reference)? {
            if other.booking_id != booking.id {
                return Err(AppError::validation("payment reference does not belong to this booking"));
            }
        }
        reference
    };

    let outcome = checkout::verify_and_reconcile(&state, &reference, EventSource::Callback).await?;

    let db = state.db()?;
    let booking = queries::get_booking_by_public_id(&db, &query.booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {}", query.booking_id)))?;
    let payment = queries::get_payment_for_booking(&db, booking.id)?
        .ok_or_else(|| AppError::NotFound(format!("payment for booking {}", query.booking_id)))?;

    Ok(Json(CallbackResponse {
        booking_id: booking.booking_id,
        booking_status: booking.status,
        payment_status: payment.status,
        outcome: outcome.as_ref().map(|o| o.label()).unwrap_or("in_progress"),
    }))
}

// POST /payments/webhook
#[derive(Deserialize)]
struct WebhookPayload {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Provider notification. The signature is checked over the raw bytes before
/// anything is parsed.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if signature.is_empty() || !state.gateway.authenticate_notification(&body, signature) {
        tracing::warn!("rejected payment webhook with missing or invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("malformed webhook payload: {e}")))?;

    let Some(reference) = payload.data["reference"].as_str().map(|s| s.to_string()) else {
        tracing::warn!(event = %payload.event, "webhook without a reference, ignoring");
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    };

    let outcome = match payload.event.as_str() {
        "charge.success" => PaymentOutcome::Success {
            transaction_id: json_id(&payload.data["id"]),
            raw: payload.data.clone(),
        },
        "charge.failed" => PaymentOutcome::Failure {
            reason: payload.data["gateway_response"]
                .as_str()
                .unwrap_or("charge failed")
                .to_string(),
            raw: payload.data.clone(),
        },
        other => {
            tracing::debug!(event = other, reference = %reference, "unhandled webhook event acknowledged");
            return Ok(Json(serde_json::json!({"status": "ignored"})));
        }
    };

    let event = PaymentEvent {
        reference,
        source: EventSource::Webhook,
        outcome,
    };

    let now = state.now();
    let result = {
        let mut db = state.db()?;
        reconciler::reconcile(&mut db, &now, &event)?
    };

    Ok(Json(serde_json::json!({"status": "ok", "outcome": result.label()})))
}
