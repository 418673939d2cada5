//! Booking state machine.
//!
//! `pending -> confirmed -> active -> completed`, with `cancelled` reachable
//! from `pending` and `confirmed`. Every transition hands back a
//! [`StatusChange`] and the caller recomputes vehicle availability from it.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{whole_seconds, Booking, BookingStatus, DriveType, UserType};
use crate::services::{availability, pricing};

/// Business rules for new bookings, taken from configuration.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub chauffeur_daily_rate: Decimal,
    pub min_self_drive_experience_years: i64,
}

impl From<&AppConfig> for BookingRules {
    fn from(config: &AppConfig) -> Self {
        Self {
            chauffeur_daily_rate: config.chauffeur_daily_rate,
            min_self_drive_experience_years: config.min_self_drive_experience_years,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub client_id: String,
    pub vehicle_id: i64,
    pub pickup_location_id: i64,
    pub dropoff_location_id: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub drive_type: DriveType,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub booking: Booking,
    pub vehicle_id: i64,
    pub from: BookingStatus,
    pub to: BookingStatus,
}

/// Result of trying to confirm a booking after payment.
#[derive(Debug)]
pub enum Confirmation {
    Confirmed(StatusChange),
    /// Already confirmed or further along; nothing to do.
    AlreadyConfirmed,
    /// Another booking now holds the vehicle for an overlapping range.
    Overlap,
    /// The booking was cancelled before payment landed.
    Cancelled,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub activated: usize,
    pub completed: usize,
    pub vehicles_checked: usize,
    pub vehicles_unavailable: usize,
}

impl NewBooking {
    fn at_whole_seconds(&self) -> NewBooking {
        NewBooking {
            start_date: whole_seconds(self.start_date),
            end_date: whole_seconds(self.end_date),
            ..self.clone()
        }
    }
}

/// Validates and stores a new `pending` booking. Nothing is written unless
/// every check passes.
pub fn create_booking(
    conn: &mut Connection,
    now: &NaiveDateTime,
    rules: &BookingRules,
    req: &NewBooking,
) -> Result<Booking, AppError> {
    let req = &req.at_whole_seconds();
    if req.end_date <= req.start_date {
        return Err(AppError::validation("end date must be after start date"));
    }
    if req.start_date < *now {
        return Err(AppError::validation("start date cannot be in the past"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let client = queries::get_user(&tx, &req.client_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", req.client_id)))?;
    if client.user_type != UserType::Client {
        return Err(AppError::validation("only clients can book vehicles"));
    }

    for location_id in [req.pickup_location_id, req.dropoff_location_id] {
        match queries::get_location(&tx, location_id)? {
            Some(location) if location.is_active => {}
            _ => return Err(AppError::validation(format!("unknown location {location_id}"))),
        }
    }

    let vehicle = queries::get_vehicle(&tx, req.vehicle_id)?
        .ok_or_else(|| AppError::NotFound(format!("vehicle {}", req.vehicle_id)))?;
    if !vehicle.is_bookable() {
        return Err(AppError::validation("vehicle is not approved for booking"));
    }

    if req.drive_type == DriveType::SelfDrive {
        let license = queries::get_license_for_user(&tx, &client.id)?
            .ok_or_else(|| AppError::validation("please upload your driving license first"))?;
        if !license.is_verified() {
            return Err(AppError::validation("your driving license needs to be verified first"));
        }
        if license.expiry_date < req.end_date.date() {
            return Err(AppError::validation("driving license expires before the end of the rental"));
        }
        if let Some(years) = client.years_of_experience {
            if years < rules.min_self_drive_experience_years {
                return Err(AppError::validation(format!(
                    "self-drive requires at least {} years of driving experience",
                    rules.min_self_drive_experience_years
                )));
            }
        }
    }

    if !availability::check_dates(&tx, &vehicle, &req.start_date, &req.end_date, None)? {
        return Err(AppError::validation("vehicle is not available for the selected dates"));
    }

    let cost = pricing::quote(
        vehicle.daily_rate,
        &req.start_date,
        &req.end_date,
        req.drive_type,
        rules.chauffeur_daily_rate,
    )?;

    let mut booking = Booking {
        id: 0,
        booking_id: uuid::Uuid::new_v4().to_string(),
        client_id: client.id,
        vehicle_id: vehicle.id,
        pickup_location_id: req.pickup_location_id,
        dropoff_location_id: req.dropoff_location_id,
        start_date: req.start_date,
        end_date: req.end_date,
        drive_type: req.drive_type,
        total_days: cost.total_days,
        vehicle_cost: cost.vehicle_cost,
        chauffeur_cost: cost.chauffeur_cost,
        total_cost: cost.total_cost,
        status: BookingStatus::Pending,
        created_at: *now,
        updated_at: *now,
    };
    booking.id = queries::insert_booking(&tx, &booking)?;

    availability::update_availability(&tx, vehicle.id, now)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.booking_id,
        vehicle_id = booking.vehicle_id,
        total_cost = %booking.total_cost,
        "booking created"
    );
    Ok(booking)
}

/// Moves a `pending` booking to `confirmed`. Runs against whatever transaction
/// the caller holds and re-checks the overlap invariant there.
pub fn confirm_booking(conn: &Connection, id: i64, now: &NaiveDateTime) -> Result<Confirmation, AppError> {
    let booking = queries::get_booking(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    match booking.status {
        BookingStatus::Pending => {}
        BookingStatus::Cancelled => return Ok(Confirmation::Cancelled),
        _ => return Ok(Confirmation::AlreadyConfirmed),
    }

    let conflicts = queries::find_overlapping_bookings(
        conn,
        booking.vehicle_id,
        &booking.start_date,
        &booking.end_date,
        Some(booking.id),
    )?;
    if !conflicts.is_empty() {
        return Ok(Confirmation::Overlap);
    }

    match transition(conn, booking, &[BookingStatus::Pending], BookingStatus::Confirmed, now)? {
        Some(change) => Ok(Confirmation::Confirmed(change)),
        None => Ok(Confirmation::AlreadyConfirmed),
    }
}

/// The status a booking should hold at `now`, if different from `status`.
pub fn next_status_for_time(
    status: BookingStatus,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    now: &NaiveDateTime,
) -> Option<BookingStatus> {
    match status {
        BookingStatus::Confirmed if now >= end => Some(BookingStatus::Completed),
        BookingStatus::Confirmed if now >= start => Some(BookingStatus::Active),
        BookingStatus::Active if now >= end => Some(BookingStatus::Completed),
        _ => None,
    }
}

/// Applies [`next_status_for_time`] to one booking.
pub fn advance_for_time(
    conn: &Connection,
    booking: Booking,
    now: &NaiveDateTime,
) -> Result<Option<StatusChange>, AppError> {
    let Some(to) = next_status_for_time(booking.status, &booking.start_date, &booking.end_date, now) else {
        return Ok(None);
    };
    let from = booking.status;
    transition(conn, booking, &[from], to, now)
}

/// Check-on-read: completes an active booking whose end has passed and returns
/// the booking as it now stands.
pub fn update_status_if_expired(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_public_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.status != BookingStatus::Active || !booking.is_expired(*now) {
        return Ok(booking);
    }

    match transition(conn, booking.clone(), &[BookingStatus::Active], BookingStatus::Completed, now)? {
        Some(change) => {
            availability::update_availability(conn, change.vehicle_id, now)?;
            Ok(change.booking)
        }
        // Someone else completed it first.
        None => Ok(queries::get_booking(conn, booking.id)?.unwrap_or(booking)),
    }
}

/// Cancels a pending or confirmed booking along with any unsettled payment.
/// Returns `None` when the booking was already cancelled.
pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Option<StatusChange>, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking_by_public_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let change = match booking.status {
        BookingStatus::Cancelled => None,
        BookingStatus::Active | BookingStatus::Completed => {
            return Err(AppError::InvalidTransition(format!(
                "cannot cancel a booking that is {}",
                booking.status
            )));
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {
            let from = booking.status;
            let row_id = booking.id;
            let change = transition(&tx, booking, &[from], BookingStatus::Cancelled, now)?;
            if change.is_some() && queries::cancel_open_payment(&tx, row_id)? {
                tracing::info!(booking_id, "open payment cancelled with booking");
            }
            change
        }
    };

    if let Some(change) = &change {
        availability::update_availability(&tx, change.vehicle_id, now)?;
    }
    tx.commit()?;

    if change.is_some() {
        tracing::info!(booking_id, "booking cancelled");
    }
    Ok(change)
}

/// Brings every confirmed or active booking in line with `now`, then
/// recomputes availability for the whole fleet.
pub fn sweep(conn: &mut Connection, now: &NaiveDateTime) -> Result<SweepReport, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut report = SweepReport::default();

    let live = queries::get_bookings_with_status(&tx, &[BookingStatus::Confirmed, BookingStatus::Active])?;
    for booking in live {
        if let Some(change) = advance_for_time(&tx, booking, now)? {
            match change.to {
                BookingStatus::Active => report.activated += 1,
                BookingStatus::Completed => report.completed += 1,
                _ => {}
            }
        }
    }

    for vehicle_id in queries::list_vehicle_ids(&tx)? {
        report.vehicles_checked += 1;
        if !availability::update_availability(&tx, vehicle_id, now)? {
            report.vehicles_unavailable += 1;
        }
    }

    tx.commit()?;

    tracing::info!(
        activated = report.activated,
        completed = report.completed,
        vehicles = report.vehicles_checked,
        unavailable = report.vehicles_unavailable,
        "booking sweep finished"
    );
    Ok(report)
}

fn transition(
    conn: &Connection,
    mut booking: Booking,
    from: &[BookingStatus],
    to: BookingStatus,
    now: &NaiveDateTime,
) -> Result<Option<StatusChange>, AppError> {
    let previous = booking.status;
    if !queries::transition_booking_status(conn, booking.id, from, to, now)? {
        return Ok(None);
    }

    tracing::info!(booking_id = %booking.booking_id, from = %previous, to = %to, "booking status changed");

    booking.status = to;
    booking.updated_at = *now;
    Ok(Some(StatusChange {
        vehicle_id: booking.vehicle_id,
        booking,
        from: previous,
        to,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, PaymentStatus};
    use crate::testutil::{dt, fixture, seed_booking, seed_user, seed_vehicle, verify_license_for};
    use chrono::NaiveDate;

    fn rules() -> BookingRules {
        BookingRules {
            chauffeur_daily_rate: Decimal::from(1000),
            min_self_drive_experience_years: 2,
        }
    }

    fn request(vehicle_id: i64, location_id: i64, start: &str, end: &str, drive_type: DriveType) -> NewBooking {
        NewBooking {
            client_id: "client-1".to_string(),
            vehicle_id,
            pickup_location_id: location_id,
            dropoff_location_id: location_id,
            start_date: dt(start),
            end_date: dt(end),
            drive_type,
        }
    }

    fn booking_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_create_self_drive_booking() {
        let mut f = fixture();
        verify_license_for(&f.conn, "client-1", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        let req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::SelfDrive);
        let booking = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_days, 3);
        assert_eq!(booking.total_cost, Decimal::from(6000));

        let stored = queries::get_booking_by_public_id(&f.conn, &booking.booking_id).unwrap().unwrap();
        assert_eq!(stored.total_cost, Decimal::from(6000));
    }

    #[test]
    fn test_chauffeur_needs_no_license() {
        let mut f = fixture();
        let req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        let booking = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap();

        assert_eq!(booking.chauffeur_cost, Decimal::from(3000));
        assert_eq!(booking.total_cost, booking.vehicle_cost + booking.chauffeur_cost);
    }

    #[test]
    fn test_sub_second_range_is_rejected() {
        let mut f = fixture();
        let mut req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-16 10:00", DriveType::Chauffeur);
        req.start_date += chrono::Duration::milliseconds(200);
        req.end_date += chrono::Duration::milliseconds(800);

        let err = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(booking_count(&f.conn), 0);

        // Fractions are dropped from otherwise valid ranges
        req.end_date = dt("2025-06-18 10:00") + chrono::Duration::milliseconds(500);
        let booking = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap();
        assert_eq!(booking.start_date, dt("2025-06-16 10:00"));
        assert_eq!(booking.end_date, dt("2025-06-18 10:00"));
    }

    #[test]
    fn test_self_drive_gating_mutates_nothing() {
        let mut f = fixture();
        let now = dt("2025-06-01 00:00");
        let req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::SelfDrive);

        // No license
        let err = create_booking(&mut f.conn, &now, &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Uploaded but unverified
        queries::upsert_license(&f.conn, "client-1", "DL-1", &NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), &now)
            .unwrap();
        let err = create_booking(&mut f.conn, &now, &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Verified but expires mid-rental
        verify_license_for(&f.conn, "client-1", NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
        let err = create_booking(&mut f.conn, &now, &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(booking_count(&f.conn), 0);
    }

    #[test]
    fn test_self_drive_requires_experience() {
        let mut f = fixture();
        seed_user(&f.conn, "novice", UserType::Client, Some(1));
        verify_license_for(&f.conn, "novice", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        let mut req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::SelfDrive);
        req.client_id = "novice".to_string();
        let err = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("2 years")));

        // Same client may still book with a chauffeur
        req.drive_type = DriveType::Chauffeur;
        assert!(create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).is_ok());
    }

    #[test]
    fn test_unrecorded_experience_is_not_rejected() {
        let mut f = fixture();
        seed_user(&f.conn, "quiet", UserType::Client, None);
        verify_license_for(&f.conn, "quiet", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        let mut req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::SelfDrive);
        req.client_id = "quiet".to_string();
        assert!(create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut f = fixture();
        let now = dt("2025-06-10 00:00");

        // Past start
        let req = request(f.vehicle_id, f.location_id, "2025-06-01 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        assert!(matches!(create_booking(&mut f.conn, &now, &rules(), &req), Err(AppError::Validation(_))));

        // Inverted range
        let req = request(f.vehicle_id, f.location_id, "2025-06-19 10:00", "2025-06-16 10:00", DriveType::Chauffeur);
        assert!(matches!(create_booking(&mut f.conn, &now, &rules(), &req), Err(AppError::Validation(_))));

        // Unknown location
        let req = request(f.vehicle_id, 999, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        assert!(matches!(create_booking(&mut f.conn, &now, &rules(), &req), Err(AppError::Validation(_))));

        // Owners cannot book
        let mut req = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        req.client_id = "owner-1".to_string();
        assert!(matches!(create_booking(&mut f.conn, &now, &rules(), &req), Err(AppError::Validation(_))));

        // Unknown vehicle
        let req = request(999, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        assert!(matches!(create_booking(&mut f.conn, &now, &rules(), &req), Err(AppError::NotFound(_))));

        assert_eq!(booking_count(&f.conn), 0);
    }

    #[test]
    fn test_unapproved_vehicle_cannot_be_booked() {
        let mut f = fixture();
        let pending = seed_vehicle(&f.conn, "owner-1", 1500, ApprovalStatus::Pending);
        let req = request(pending, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        let err = create_booking(&mut f.conn, &dt("2025-06-01 00:00"), &rules(), &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_overlap_with_confirmed_booking_rejected() {
        let mut f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Confirmed,
        );

        let now = dt("2025-06-01 00:00");
        let overlapping = request(f.vehicle_id, f.location_id, "2025-06-16 10:00", "2025-06-19 10:00", DriveType::Chauffeur);
        let err = create_booking(&mut f.conn, &now, &rules(), &overlapping).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("not available")));

        // Touching the end boundary is fine
        let touching = request(f.vehicle_id, f.location_id, "2025-06-18 00:00", "2025-06-20 00:00", DriveType::Chauffeur);
        assert!(create_booking(&mut f.conn, &now, &rules(), &touching).is_ok());
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let f = fixture();
        let booking = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Pending,
        );
        let now = dt("2025-06-01 00:00");

        let first = confirm_booking(&f.conn, booking.id, &now).unwrap();
        assert!(matches!(first, Confirmation::Confirmed(ref c) if c.to == BookingStatus::Confirmed));

        let second = confirm_booking(&f.conn, booking.id, &now).unwrap();
        assert!(matches!(second, Confirmation::AlreadyConfirmed));
    }

    #[test]
    fn test_confirm_detects_overlap() {
        let f = fixture();
        let now = dt("2025-06-01 00:00");
        let a = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Pending,
        );
        let b = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-16 00:00"), dt("2025-06-19 00:00"), BookingStatus::Pending,
        );

        assert!(matches!(confirm_booking(&f.conn, a.id, &now).unwrap(), Confirmation::Confirmed(_)));
        assert!(matches!(confirm_booking(&f.conn, b.id, &now).unwrap(), Confirmation::Overlap));

        let b = queries::get_booking(&f.conn, b.id).unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[test]
    fn test_next_status_for_time() {
        let (start, end) = (dt("2025-06-15 00:00"), dt("2025-06-18 00:00"));
        let before = dt("2025-06-14 00:00");
        let during = dt("2025-06-16 00:00");
        let after = dt("2025-06-20 00:00");

        assert_eq!(next_status_for_time(BookingStatus::Confirmed, &start, &end, &before), None);
        assert_eq!(next_status_for_time(BookingStatus::Confirmed, &start, &end, &start), Some(BookingStatus::Active));
        assert_eq!(next_status_for_time(BookingStatus::Confirmed, &start, &end, &during), Some(BookingStatus::Active));
        assert_eq!(next_status_for_time(BookingStatus::Confirmed, &start, &end, &after), Some(BookingStatus::Completed));
        assert_eq!(next_status_for_time(BookingStatus::Active, &start, &end, &during), None);
        assert_eq!(next_status_for_time(BookingStatus::Active, &start, &end, &end), Some(BookingStatus::Completed));
        assert_eq!(next_status_for_time(BookingStatus::Pending, &start, &end, &after), None);
        assert_eq!(next_status_for_time(BookingStatus::Cancelled, &start, &end, &after), None);
    }

    #[test]
    fn test_update_status_if_expired() {
        let f = fixture();
        let booking = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Active,
        );

        let during = update_status_if_expired(&f.conn, &booking.booking_id, &dt("2025-06-17 00:00")).unwrap();
        assert_eq!(during.status, BookingStatus::Active);

        let after = update_status_if_expired(&f.conn, &booking.booking_id, &dt("2025-06-18 00:01")).unwrap();
        assert_eq!(after.status, BookingStatus::Completed);

        let again = update_status_if_expired(&f.conn, &booking.booking_id, &dt("2025-06-19 00:00")).unwrap();
        assert_eq!(again.status, BookingStatus::Completed);

        let vehicle = queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap();
        assert!(vehicle.is_available);
    }

    #[test]
    fn test_cancel_transitions() {
        let mut f = fixture();
        let now = dt("2025-06-01 00:00");
        let pending = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Pending,
        );
        let active = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-01 00:00"), dt("2025-06-03 00:00"), BookingStatus::Active,
        );

        let change = cancel_booking(&mut f.conn, &pending.booking_id, &now).unwrap().unwrap();
        assert_eq!(change.from, BookingStatus::Pending);
        assert_eq!(change.to, BookingStatus::Cancelled);

        // Idempotent
        assert!(cancel_booking(&mut f.conn, &pending.booking_id, &now).unwrap().is_none());

        let err = cancel_booking(&mut f.conn, &active.booking_id, &now).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let err = cancel_booking(&mut f.conn, "no-such-booking", &now).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_cancel_cancels_open_payment_and_frees_vehicle() {
        let mut f = fixture();
        let now = dt("2025-06-01 00:00");
        let booking = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-15 00:00"), dt("2025-06-18 00:00"), BookingStatus::Confirmed,
        );
        queries::get_or_create_payment(&f.conn, &booking, "client-1@example.com", "254700000000", &now).unwrap();
        availability::update_availability(&f.conn, f.vehicle_id, &now).unwrap();
        assert!(!queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap().is_available);

        cancel_booking(&mut f.conn, &booking.booking_id, &now).unwrap();

        let payment = queries::get_payment_for_booking(&f.conn, booking.id).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
        assert!(queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap().is_available);
    }

    #[test]
    fn test_sweep_advances_bookings() {
        let mut f = fixture();
        let starting = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-10 00:00"), dt("2025-06-12 00:00"), BookingStatus::Confirmed,
        );
        let ending = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-01 00:00"), dt("2025-06-05 00:00"), BookingStatus::Active,
        );
        let untouched = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-20 00:00"), dt("2025-06-22 00:00"), BookingStatus::Confirmed,
        );

        let report = sweep(&mut f.conn, &dt("2025-06-11 00:00")).unwrap();
        assert_eq!(report.activated, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.vehicles_checked, 1);
        assert_eq!(report.vehicles_unavailable, 1);

        let status = |id| queries::get_booking(&f.conn, id).unwrap().unwrap().status;
        assert_eq!(status(starting.id), BookingStatus::Active);
        assert_eq!(status(ending.id), BookingStatus::Completed);
        assert_eq!(status(untouched.id), BookingStatus::Confirmed);

        // A second sweep at the same instant changes nothing
        let report = sweep(&mut f.conn, &dt("2025-06-11 00:00")).unwrap();
        assert_eq!(report.activated + report.completed, 0);
    }

    #[test]
    fn test_sweep_skips_confirmed_straight_to_completed() {
        let mut f = fixture();
        let stale = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-06-01 00:00"), dt("2025-06-03 00:00"), BookingStatus::Confirmed,
        );

        let report = sweep(&mut f.conn, &dt("2025-06-10 00:00")).unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.activated, 0);
        let stale = queries::get_booking(&f.conn, stale.id).unwrap().unwrap();
        assert_eq!(stale.status, BookingStatus::Completed);
        assert!(queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap().is_available);
    }
}
