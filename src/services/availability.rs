use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, Vehicle};

/// Strict interval overlap: ranges that only touch at a boundary do not overlap.
pub fn overlaps(
    a_start: &NaiveDateTime,
    a_end: &NaiveDateTime,
    b_start: &NaiveDateTime,
    b_end: &NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Whether `vehicle` can take a booking for `[start, end)` given its bookings.
/// Fails closed for vehicles that are not approved.
pub fn is_available_for_dates(
    vehicle: &Vehicle,
    bookings: &[Booking],
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> bool {
    if !vehicle.is_bookable() {
        return false;
    }

    !bookings.iter().any(|b| {
        b.vehicle_id == vehicle.id
            && b.status.holds_vehicle()
            && overlaps(&b.start_date, &b.end_date, start, end)
    })
}

/// The cached `is_available` flag as a function of the booking set at `now`.
///
/// A vehicle in use is unavailable. A vehicle with any confirmed future booking
/// is also flagged unavailable; booking decisions never read this flag and use
/// [`is_available_for_dates`] instead.
pub fn derive_availability(bookings: &[Booking], now: &NaiveDateTime) -> bool {
    let in_use = bookings
        .iter()
        .any(|b| b.status.holds_vehicle() && b.start_date <= *now && *now < b.end_date);
    if in_use {
        return false;
    }

    let has_future = bookings
        .iter()
        .any(|b| b.status == BookingStatus::Confirmed && b.start_date > *now);
    !has_future
}

/// Store-backed range check. The query narrows the vehicle's bookings to
/// candidates and [`is_available_for_dates`] makes the decision.
/// `exclude_booking` lets a booking be re-checked against everything except
/// itself.
pub fn check_dates(
    conn: &Connection,
    vehicle: &Vehicle,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_booking: Option<i64>,
) -> anyhow::Result<bool> {
    if !vehicle.is_bookable() {
        return Ok(false);
    }
    let candidates = queries::find_overlapping_bookings(conn, vehicle.id, start, end, exclude_booking)?;
    Ok(is_available_for_dates(vehicle, &candidates, start, end))
}

/// Recomputes and persists the vehicle's availability flag. Returns the new value.
pub fn update_availability(conn: &Connection, vehicle_id: i64, now: &NaiveDateTime) -> anyhow::Result<bool> {
    let bookings = queries::get_bookings_for_vehicle(conn, vehicle_id)?;
    let available = derive_availability(&bookings, now);
    queries::set_vehicle_availability(conn, vehicle_id, available)?;
    tracing::debug!(vehicle_id, available, "vehicle availability recomputed");
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, UserType};
    use crate::testutil::{dt, fixture, seed_booking, seed_user, seed_vehicle};

    #[test]
    fn test_overlap_is_strict() {
        let (d1, d3, d5) = (dt("2025-07-01 00:00"), dt("2025-07-03 00:00"), dt("2025-07-05 00:00"));
        assert!(!overlaps(&d1, &d3, &d3, &d5));
        assert!(!overlaps(&d3, &d5, &d1, &d3));
        assert!(overlaps(&d1, &d5, &d3, &d5));
        assert!(overlaps(&d1, &d3, &dt("2025-07-02 00:00"), &dt("2025-07-04 00:00")));
    }

    #[test]
    fn test_boundary_touch_is_available() {
        let f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-01 00:00"), dt("2025-07-03 00:00"), BookingStatus::Confirmed,
        );
        let vehicle = queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap();

        assert!(check_dates(&f.conn, &vehicle, &dt("2025-07-03 00:00"), &dt("2025-07-05 00:00"), None).unwrap());
        assert!(!check_dates(&f.conn, &vehicle, &dt("2025-07-02 00:00"), &dt("2025-07-04 00:00"), None).unwrap());
    }

    #[test]
    fn test_pending_and_cancelled_do_not_block() {
        let f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-01 00:00"), dt("2025-07-05 00:00"), BookingStatus::Pending,
        );
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-01 00:00"), dt("2025-07-05 00:00"), BookingStatus::Cancelled,
        );
        let vehicle = queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap();
        assert!(check_dates(&f.conn, &vehicle, &dt("2025-07-02 00:00"), &dt("2025-07-03 00:00"), None).unwrap());
    }

    #[test]
    fn test_unapproved_vehicle_fails_closed() {
        let f = fixture();
        seed_user(&f.conn, "owner-2", UserType::Owner, None);
        let pending = seed_vehicle(&f.conn, "owner-2", 1500, ApprovalStatus::Pending);
        let declined = seed_vehicle(&f.conn, "owner-2", 1500, ApprovalStatus::Declined);

        for id in [pending, declined] {
            let vehicle = queries::get_vehicle(&f.conn, id).unwrap().unwrap();
            assert!(!is_available_for_dates(&vehicle, &[], &dt("2025-07-01 00:00"), &dt("2025-07-02 00:00")));
            assert!(!check_dates(&f.conn, &vehicle, &dt("2025-07-01 00:00"), &dt("2025-07-02 00:00"), None).unwrap());
        }
    }

    #[test]
    fn test_derive_availability() {
        let f = fixture();
        let now = dt("2025-07-10 12:00");

        // Nothing booked
        assert!(update_availability(&f.conn, f.vehicle_id, &now).unwrap());

        // A completed booking in the past does not matter
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-01 00:00"), dt("2025-07-03 00:00"), BookingStatus::Completed,
        );
        assert!(update_availability(&f.conn, f.vehicle_id, &now).unwrap());

        // A confirmed future booking flags the vehicle
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-20 00:00"), dt("2025-07-22 00:00"), BookingStatus::Confirmed,
        );
        assert!(!update_availability(&f.conn, f.vehicle_id, &now).unwrap());
        let vehicle = queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap();
        assert!(!vehicle.is_available);
    }

    #[test]
    fn test_in_use_window_is_half_open() {
        let f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-10 00:00"), dt("2025-07-12 00:00"), BookingStatus::Active,
        );
        assert!(!update_availability(&f.conn, f.vehicle_id, &dt("2025-07-10 00:00")).unwrap());
        assert!(!update_availability(&f.conn, f.vehicle_id, &dt("2025-07-11 23:59")).unwrap());
        assert!(update_availability(&f.conn, f.vehicle_id, &dt("2025-07-12 00:00")).unwrap());
    }

    #[test]
    fn test_update_availability_is_stable() {
        let f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-10 00:00"), dt("2025-07-12 00:00"), BookingStatus::Confirmed,
        );
        let now = dt("2025-07-11 00:00");
        let first = update_availability(&f.conn, f.vehicle_id, &now).unwrap();
        let second = update_availability(&f.conn, f.vehicle_id, &now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_store_rejects_overlapping_confirmed_bookings() {
        let f = fixture();
        seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-01 00:00"), dt("2025-07-03 00:00"), BookingStatus::Confirmed,
        );
        let pending = seed_booking(
            &f.conn, f.vehicle_id, "client-1", f.location_id,
            dt("2025-07-02 00:00"), dt("2025-07-04 00:00"), BookingStatus::Pending,
        );
        let result = queries::transition_booking_status(
            &f.conn,
            pending.id,
            &[BookingStatus::Pending],
            BookingStatus::Confirmed,
            &dt("2025-06-01 00:00"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_store_check_agrees_with_in_memory_check() {
        let f = fixture();
        for (start, end, status) in [
            ("2025-07-01 00:00", "2025-07-03 00:00", BookingStatus::Confirmed),
            ("2025-07-05 00:00", "2025-07-08 00:00", BookingStatus::Active),
            ("2025-07-10 00:00", "2025-07-12 00:00", BookingStatus::Pending),
            ("2025-07-14 00:00", "2025-07-16 00:00", BookingStatus::Cancelled),
            ("2025-07-18 00:00", "2025-07-20 00:00", BookingStatus::Completed),
        ] {
            seed_booking(&f.conn, f.vehicle_id, "client-1", f.location_id, dt(start), dt(end), status);
        }
        let vehicle = queries::get_vehicle(&f.conn, f.vehicle_id).unwrap().unwrap();
        let bookings = queries::get_bookings_for_vehicle(&f.conn, f.vehicle_id).unwrap();

        let mut day = dt("2025-06-29 00:00");
        while day < dt("2025-07-22 00:00") {
            for hours in [12, 48, 96] {
                let end = day + chrono::Duration::hours(hours);
                assert_eq!(
                    check_dates(&f.conn, &vehicle, &day, &end, None).unwrap(),
                    is_available_for_dates(&vehicle, &bookings, &day, &end),
                    "disagreement for {day} + {hours}h"
                );
            }
            day += chrono::Duration::hours(12);
        }
    }
}
