//! Fixtures shared by the unit tests.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::{self, queries};
use crate::models::{
    ApprovalStatus, Booking, BookingStatus, DriveType, User, UserType, VerificationStatus, Vehicle,
    VehicleCategory, VehicleCondition,
};
use crate::services::pricing;

pub fn setup_db() -> Connection {
    db::init_db(":memory:").unwrap()
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn seed_user(conn: &Connection, id: &str, user_type: UserType, years_of_experience: Option<i64>) {
    queries::create_user(
        conn,
        &User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{id}@example.com"),
            user_type,
            phone_number: "254700000000".to_string(),
            years_of_experience,
        },
    )
    .unwrap();
}

pub fn seed_location(conn: &Connection) -> i64 {
    queries::create_location(conn, "JKIA", "Nairobi").unwrap()
}

pub fn seed_vehicle(conn: &Connection, owner_id: &str, daily_rate: i64, status: ApprovalStatus) -> i64 {
    queries::create_vehicle(
        conn,
        &Vehicle {
            id: 0,
            owner_id: owner_id.to_string(),
            make: "Toyota".to_string(),
            model: "Prado".to_string(),
            year: 2021,
            category: VehicleCategory::Suv,
            condition: VehicleCondition::Excellent,
            mileage: 42_000,
            daily_rate: Decimal::from(daily_rate),
            description: String::new(),
            approval_status: status,
            admin_notes: String::new(),
            reviewed_at: None,
            is_available: true,
            created_at: dt("2025-01-01 00:00"),
        },
    )
    .unwrap()
}

pub fn verify_license_for(conn: &Connection, user_id: &str, expiry: NaiveDate) {
    queries::upsert_license(conn, user_id, "DL-0001", &expiry, &dt("2025-01-01 00:00")).unwrap();
    let license = queries::get_license_for_user(conn, user_id).unwrap().unwrap();
    queries::review_license(conn, license.id, VerificationStatus::Verified, "", &dt("2025-01-02 00:00"))
        .unwrap();
}

/// Inserts a booking directly, bypassing lifecycle validation.
pub fn seed_booking(
    conn: &Connection,
    vehicle_id: i64,
    client_id: &str,
    location_id: i64,
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: BookingStatus,
) -> Booking {
    let cost = pricing::quote(
        Decimal::from(2000),
        &start,
        &end,
        DriveType::SelfDrive,
        Decimal::from(1000),
    )
    .unwrap();
    let mut booking = Booking {
        id: 0,
        booking_id: uuid::Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        vehicle_id,
        pickup_location_id: location_id,
        dropoff_location_id: location_id,
        start_date: start,
        end_date: end,
        drive_type: DriveType::SelfDrive,
        total_days: cost.total_days,
        vehicle_cost: cost.vehicle_cost,
        chauffeur_cost: cost.chauffeur_cost,
        total_cost: cost.total_cost,
        status,
        created_at: dt("2025-01-01 00:00"),
        updated_at: dt("2025-01-01 00:00"),
    };
    booking.id = queries::insert_booking(conn, &booking).unwrap();
    booking
}

/// Owner, client, location and an approved vehicle at 2000/day.
pub struct Fixture {
    pub conn: Connection,
    pub location_id: i64,
    pub vehicle_id: i64,
}

pub fn fixture() -> Fixture {
    let conn = setup_db();
    seed_user(&conn, "owner-1", UserType::Owner, None);
    seed_user(&conn, "client-1", UserType::Client, Some(5));
    let location_id = seed_location(&conn);
    let vehicle_id = seed_vehicle(&conn, "owner-1", 2000, ApprovalStatus::Approved);
    Fixture {
        conn,
        location_id,
        vehicle_id,
    }
}
