use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, DriveType, Location, Payment, PaymentStatus, UserType};
use crate::services::checkout::{self, PaymentStarted};
use crate::services::lifecycle::{self, BookingRules, NewBooking};
use crate::state::AppState;

#[derive(Serialize)]
pub struct PaymentSummary {
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<Payment> for PaymentSummary {
    fn from(p: Payment) -> Self {
        Self {
            status: p.status,
            amount: p.amount,
            reference: p.reference,
            transaction_id: p.transaction_id,
            failure_reason: p.failure_reason,
            completed_at: p.completed_at,
        }
    }
}

#[derive(Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub payment: Option<PaymentSummary>,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let now = state.now();
    let rules = BookingRules::from(&state.config);

    let booking = {
        let mut db = state.db()?;
        lifecycle::create_booking(&mut db, &now, &rules, &body)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings?client_id=
#[derive(Deserialize)]
pub struct ClientBookingsQuery {
    pub client_id: String,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let now = state.now();
    let db = state.db()?;

    let bookings = queries::get_bookings_for_client(&db, &query.client_id)?;
    Ok(Json(refresh_expired(&db, bookings, &now)?))
}

/// Applies lazy expiry to a listing before it is returned.
pub(crate) fn refresh_expired(
    conn: &Connection,
    bookings: Vec<Booking>,
    now: &NaiveDateTime,
) -> Result<Vec<Booking>, AppError> {
    let mut refreshed = Vec::with_capacity(bookings.len());
    for booking in bookings {
        if booking.is_expired(*now) {
            refreshed.push(lifecycle::update_status_if_expired(conn, &booking.booking_id, now)?);
        } else {
            refreshed.push(booking);
        }
    }
    Ok(refreshed)
}

// GET /api/owners/:owner_id/bookings
/// Bookings made on any of the owner's vehicles.
pub async fn list_owner_bookings(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let now = state.now();
    let db = state.db()?;

    let owner = queries::get_user(&db, &owner_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {owner_id}")))?;
    if owner.user_type != UserType::Owner {
        return Err(AppError::validation("user is not a vehicle owner"));
    }

    let bookings = queries::get_bookings_for_owner(&db, &owner.id)?;
    Ok(Json(refresh_expired(&db, bookings, &now)?))
}

// GET /api/bookings/:booking_id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    let now = state.now();
    let db = state.db()?;

    let booking = lifecycle::update_status_if_expired(&db, &booking_id, &now)?;
    let payment = queries::get_payment_for_booking(&db, booking.id)?.map(PaymentSummary::from);

    Ok(Json(BookingDetail { booking, payment }))
}

// POST /api/bookings/:booking_id/payment
pub async fn start_payment(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<PaymentStarted>, AppError> {
    let started = checkout::start_payment(&state, &booking_id).await?;
    Ok(Json(started))
}

// GET /api/bookings/:booking_id/receipt
#[derive(Serialize)]
pub struct ReceiptClient {
    pub username: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Serialize)]
pub struct Receipt {
    pub booking_id: String,
    pub status: BookingStatus,
    pub paid: bool,
    pub client: ReceiptClient,
    pub vehicle_id: i64,
    pub vehicle: String,
    pub pickup_location: Location,
    pub dropoff_location: Location,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub drive_type: DriveType,
    pub total_days: i64,
    pub vehicle_cost: Decimal,
    pub chauffeur_cost: Decimal,
    pub total_cost: Decimal,
    pub payment: Option<PaymentSummary>,
    pub issued_at: NaiveDateTime,
}

pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<Receipt>, AppError> {
    let now = state.now();
    let db = state.db()?;

    let booking = lifecycle::update_status_if_expired(&db, &booking_id, &now)?;
    let missing = |what: String| AppError::Internal(anyhow::anyhow!("{what} for booking {booking_id} is missing"));

    let client = queries::get_user(&db, &booking.client_id)?
        .ok_or_else(|| missing(format!("client {}", booking.client_id)))?;
    let vehicle = queries::get_vehicle(&db, booking.vehicle_id)?
        .ok_or_else(|| missing(format!("vehicle {}", booking.vehicle_id)))?;
    let pickup_location = queries::get_location(&db, booking.pickup_location_id)?
        .ok_or_else(|| missing(format!("location {}", booking.pickup_location_id)))?;
    let dropoff_location = queries::get_location(&db, booking.dropoff_location_id)?
        .ok_or_else(|| missing(format!("location {}", booking.dropoff_location_id)))?;
    let payment = queries::get_payment_for_booking(&db, booking.id)?;

    Ok(Json(Receipt {
        paid: payment.as_ref().is_some_and(|p| p.status == PaymentStatus::Completed),
        client: ReceiptClient {
            username: client.username,
            email: client.email,
            phone_number: client.phone_number,
        },
        vehicle_id: vehicle.id,
        vehicle: vehicle.display_name(),
        pickup_location,
        dropoff_location,
        payment: payment.map(PaymentSummary::from),
        issued_at: now,
        booking_id: booking.booking_id,
        status: booking.status,
        start_date: booking.start_date,
        end_date: booking.end_date,
        drive_type: booking.drive_type,
        total_days: booking.total_days,
        vehicle_cost: booking.vehicle_cost,
        chauffeur_cost: booking.chauffeur_cost,
        total_cost: booking.total_cost,
    }))
}
