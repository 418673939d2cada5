use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::models::{
    ApprovalStatus, Booking, BookingStatus, DriveType, DrivingLicense, Location, Payment,
    PaymentStatus, User, UserType, VerificationStatus, Vehicle, VehicleCategory, VehicleCondition,
    TIMESTAMP_FORMAT,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn fmt_ts(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid decimal in database: {s}"))
}

/// `'a', 'b'` for use in an `IN (...)` clause. Values come from closed enums.
fn status_list(statuses: &[&'static str]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, user_type, phone_number, years_of_experience)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.username,
            user.email,
            user.user_type.as_str(),
            user.phone_number,
            user.years_of_experience,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, email, user_type, phone_number, years_of_experience
             FROM users WHERE id = ?1",
            params![id],
            |row| {
                let user_type: String = row.get(3)?;
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    user_type: UserType::parse(&user_type),
                    phone_number: row.get(4)?,
                    years_of_experience: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Locations ──

pub fn create_location(conn: &Connection, name: &str, city: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO locations (name, city) VALUES (?1, ?2)",
        params![name, city],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_location(conn: &Connection, id: i64) -> anyhow::Result<Option<Location>> {
    let location = conn
        .query_row(
            "SELECT id, name, city, is_active FROM locations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Location {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                    is_active: row.get::<_, i32>(3)? != 0,
                })
            },
        )
        .optional()?;
    Ok(location)
}

pub fn list_active_locations(conn: &Connection) -> anyhow::Result<Vec<Location>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, city, is_active FROM locations WHERE is_active = 1 ORDER BY city, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Location {
            id: row.get(0)?,
            name: row.get(1)?,
            city: row.get(2)?,
            is_active: row.get::<_, i32>(3)? != 0,
        })
    })?;

    let mut locations = vec![];
    for row in rows {
        locations.push(row?);
    }
    Ok(locations)
}

// ── Vehicles ──

const VEHICLE_COLUMNS: &str = "id, owner_id, make, model, year, category, condition, mileage, daily_rate, \
     description, approval_status, admin_notes, reviewed_at, is_available, created_at";

pub fn create_vehicle(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO vehicles (owner_id, make, model, year, category, condition, mileage, daily_rate,
                               description, approval_status, admin_notes, is_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            vehicle.owner_id,
            vehicle.make,
            vehicle.model,
            vehicle.year,
            vehicle.category.as_str(),
            vehicle.condition.as_str(),
            vehicle.mileage,
            vehicle.daily_rate.to_string(),
            vehicle.description,
            vehicle.approval_status.as_str(),
            vehicle.admin_notes,
            vehicle.is_available as i32,
            fmt_ts(&vehicle.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_vehicle(conn: &Connection, id: i64) -> anyhow::Result<Option<Vehicle>> {
    let result = conn
        .query_row(
            &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"),
            params![id],
            |row| Ok(parse_vehicle_row(row)),
        )
        .optional()?;
    result.transpose()
}

pub fn list_vehicles(
    conn: &Connection,
    approval: Option<ApprovalStatus>,
    category: Option<VehicleCategory>,
) -> anyhow::Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles
         WHERE (?1 IS NULL OR approval_status = ?1) AND (?2 IS NULL OR category = ?2)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![approval.map(|a| a.as_str()), category.map(|c| c.as_str())],
        |row| Ok(parse_vehicle_row(row)),
    )?;

    let mut vehicles = vec![];
    for row in rows {
        vehicles.push(row??);
    }
    Ok(vehicles)
}

pub fn list_vehicles_for_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_vehicle_row(row)))?;

    let mut vehicles = vec![];
    for row in rows {
        vehicles.push(row??);
    }
    Ok(vehicles)
}

/// Writes the owner-editable fields and the approval status. Review notes,
/// availability and ownership are left alone.
pub fn update_vehicle_details(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE vehicles
         SET make = ?1, model = ?2, year = ?3, category = ?4, condition = ?5, mileage = ?6,
             daily_rate = ?7, description = ?8, approval_status = ?9
         WHERE id = ?10 AND owner_id = ?11",
        params![
            vehicle.make,
            vehicle.model,
            vehicle.year,
            vehicle.category.as_str(),
            vehicle.condition.as_str(),
            vehicle.mileage,
            vehicle.daily_rate.to_string(),
            vehicle.description,
            vehicle.approval_status.as_str(),
            vehicle.id,
            vehicle.owner_id,
        ],
    )?;
    Ok(count > 0)
}

pub fn list_vehicle_ids(conn: &Connection) -> anyhow::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM vehicles ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn set_vehicle_availability(conn: &Connection, id: i64, available: bool) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE vehicles SET is_available = ?1 WHERE id = ?2",
        params![available as i32, id],
    )?;
    Ok(())
}

pub fn review_vehicle(
    conn: &Connection,
    id: i64,
    status: ApprovalStatus,
    admin_notes: &str,
    reviewed_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE vehicles SET approval_status = ?1, admin_notes = ?2, reviewed_at = ?3 WHERE id = ?4",
        params![status.as_str(), admin_notes, fmt_ts(reviewed_at), id],
    )?;
    Ok(count > 0)
}

fn parse_vehicle_row(row: &rusqlite::Row) -> anyhow::Result<Vehicle> {
    let category: String = row.get(5)?;
    let condition: String = row.get(6)?;
    let daily_rate: String = row.get(8)?;
    let approval_status: String = row.get(10)?;
    let reviewed_at: Option<String> = row.get(12)?;
    let created_at: String = row.get(14)?;

    Ok(Vehicle {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        year: row.get(4)?,
        category: VehicleCategory::parse(&category),
        condition: VehicleCondition::parse(&condition),
        mileage: row.get(7)?,
        daily_rate: parse_decimal(&daily_rate)?,
        description: row.get(9)?,
        approval_status: ApprovalStatus::parse(&approval_status),
        admin_notes: row.get(11)?,
        reviewed_at: parse_opt_ts(reviewed_at)?,
        is_available: row.get::<_, i32>(13)? != 0,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Driving Licenses ──

const LICENSE_COLUMNS: &str =
    "id, user_id, license_number, expiry_date, verification_status, admin_notes, verified_at, uploaded_at";

/// Stores a (re-)uploaded license. Any previous verification is discarded.
pub fn upsert_license(
    conn: &Connection,
    user_id: &str,
    license_number: &str,
    expiry_date: &NaiveDate,
    uploaded_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO driving_licenses (user_id, license_number, expiry_date, verification_status, uploaded_at)
         VALUES (?1, ?2, ?3, 'pending', ?4)
         ON CONFLICT(user_id) DO UPDATE SET
           license_number = excluded.license_number,
           expiry_date = excluded.expiry_date,
           verification_status = 'pending',
           admin_notes = '',
           verified_at = NULL,
           uploaded_at = excluded.uploaded_at",
        params![
            user_id,
            license_number,
            expiry_date.format(DATE_FORMAT).to_string(),
            fmt_ts(uploaded_at),
        ],
    )?;
    Ok(())
}

pub fn get_license_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<DrivingLicense>> {
    let result = conn
        .query_row(
            &format!("SELECT {LICENSE_COLUMNS} FROM driving_licenses WHERE user_id = ?1"),
            params![user_id],
            |row| Ok(parse_license_row(row)),
        )
        .optional()?;
    result.transpose()
}

pub fn get_license(conn: &Connection, id: i64) -> anyhow::Result<Option<DrivingLicense>> {
    let result = conn
        .query_row(
            &format!("SELECT {LICENSE_COLUMNS} FROM driving_licenses WHERE id = ?1"),
            params![id],
            |row| Ok(parse_license_row(row)),
        )
        .optional()?;
    result.transpose()
}

pub fn list_licenses(
    conn: &Connection,
    status: Option<VerificationStatus>,
) -> anyhow::Result<Vec<DrivingLicense>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LICENSE_COLUMNS} FROM driving_licenses
         WHERE (?1 IS NULL OR verification_status = ?1)
         ORDER BY uploaded_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![status.map(|s| s.as_str())], |row| Ok(parse_license_row(row)))?;

    let mut licenses = vec![];
    for row in rows {
        licenses.push(row??);
    }
    Ok(licenses)
}

pub fn review_license(
    conn: &Connection,
    id: i64,
    status: VerificationStatus,
    admin_notes: &str,
    verified_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE driving_licenses SET verification_status = ?1, admin_notes = ?2, verified_at = ?3 WHERE id = ?4",
        params![status.as_str(), admin_notes, fmt_ts(verified_at), id],
    )?;
    Ok(count > 0)
}

fn parse_license_row(row: &rusqlite::Row) -> anyhow::Result<DrivingLicense> {
    let expiry_date: String = row.get(3)?;
    let status: String = row.get(4)?;
    let verified_at: Option<String> = row.get(6)?;
    let uploaded_at: String = row.get(7)?;

    Ok(DrivingLicense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        license_number: row.get(2)?,
        expiry_date: NaiveDate::parse_from_str(&expiry_date, DATE_FORMAT)
            .with_context(|| format!("invalid license expiry date: {expiry_date}"))?,
        verification_status: VerificationStatus::parse(&status),
        admin_notes: row.get(5)?,
        verified_at: parse_opt_ts(verified_at)?,
        uploaded_at: parse_ts(&uploaded_at)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, booking_id, client_id, vehicle_id, pickup_location_id, dropoff_location_id, \
     start_date, end_date, drive_type, total_days, vehicle_cost, chauffeur_cost, total_cost, status, \
     created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO bookings (booking_id, client_id, vehicle_id, pickup_location_id, dropoff_location_id,
                               start_date, end_date, drive_type, total_days, vehicle_cost, chauffeur_cost,
                               total_cost, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.booking_id,
            booking.client_id,
            booking.vehicle_id,
            booking.pickup_location_id,
            booking.dropoff_location_id,
            fmt_ts(&booking.start_date),
            fmt_ts(&booking.end_date),
            booking.drive_type.as_str(),
            booking.total_days,
            booking.vehicle_cost.to_string(),
            booking.chauffeur_cost.to_string(),
            booking.total_cost.to_string(),
            booking.status.as_str(),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    result.transpose()
}

pub fn get_booking_by_public_id(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = ?1"),
            params![booking_id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    result.transpose()
}

pub fn get_bookings_for_vehicle(conn: &Connection, vehicle_id: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE vehicle_id = ?1 ORDER BY start_date ASC"
    ))?;
    let rows = stmt.query_map(params![vehicle_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_client(conn: &Connection, client_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE client_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![client_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Bookings on any vehicle listed by `owner_id`, newest first.
pub fn get_bookings_for_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE vehicle_id IN (SELECT id FROM vehicles WHERE owner_id = ?1)
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Bookings on `vehicle_id` that hold the vehicle and strictly overlap `[start, end)`.
pub fn find_overlapping_bookings(
    conn: &Connection,
    vehicle_id: i64,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_id: Option<i64>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE vehicle_id = ?1
           AND status IN ('confirmed', 'active')
           AND start_date < ?2
           AND end_date > ?3
           AND (?4 IS NULL OR id != ?4)"
    ))?;
    let rows = stmt.query_map(
        params![vehicle_id, fmt_ts(end), fmt_ts(start), exclude_id],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_with_status(
    conn: &Connection,
    statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let names: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status IN ({}) ORDER BY start_date ASC",
        status_list(&names)
    ))?;
    let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(
        params![status_filter.map(|s| s.as_str()), limit],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Compare-and-set on booking status. Returns false when the booking was not in
/// one of the `from` states.
pub fn transition_booking_status(
    conn: &Connection,
    id: i64,
    from: &[BookingStatus],
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let names: Vec<&'static str> = from.iter().map(|s| s.as_str()).collect();
    let count = conn.execute(
        &format!(
            "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
            status_list(&names)
        ),
        params![to.as_str(), fmt_ts(now), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_date: String = row.get(6)?;
    let end_date: String = row.get(7)?;
    let drive_type: String = row.get(8)?;
    let vehicle_cost: String = row.get(10)?;
    let chauffeur_cost: String = row.get(11)?;
    let total_cost: String = row.get(12)?;
    let status: String = row.get(13)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(Booking {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        client_id: row.get(2)?,
        vehicle_id: row.get(3)?,
        pickup_location_id: row.get(4)?,
        dropoff_location_id: row.get(5)?,
        start_date: parse_ts(&start_date)?,
        end_date: parse_ts(&end_date)?,
        drive_type: DriveType::parse(&drive_type),
        total_days: row.get(9)?,
        vehicle_cost: parse_decimal(&vehicle_cost)?,
        chauffeur_cost: parse_decimal(&chauffeur_cost)?,
        total_cost: parse_decimal(&total_cost)?,
        status: BookingStatus::parse(&status),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str = "id, booking_id, amount, email, phone_number, reference, access_code, \
     transaction_id, gateway_response, failure_reason, status, created_at, completed_at";

/// Creates the payment row for a booking, or returns the existing one. The
/// amount is only ever written here.
pub fn get_or_create_payment(
    conn: &Connection,
    booking: &Booking,
    email: &str,
    phone_number: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Payment> {
    conn.execute(
        "INSERT INTO payments (booking_id, amount, email, phone_number, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
         ON CONFLICT(booking_id) DO UPDATE SET
           email = excluded.email,
           phone_number = excluded.phone_number",
        params![
            booking.id,
            booking.total_cost.to_string(),
            email,
            phone_number,
            fmt_ts(now),
        ],
    )?;

    get_payment_for_booking(conn, booking.id)?
        .ok_or_else(|| anyhow::anyhow!("payment for booking {} vanished after insert", booking.id))
}

pub fn get_payment_for_booking(conn: &Connection, booking_id: i64) -> anyhow::Result<Option<Payment>> {
    let result = conn
        .query_row(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1"),
            params![booking_id],
            |row| Ok(parse_payment_row(row)),
        )
        .optional()?;
    result.transpose()
}

/// Resolves any reference ever issued for a payment, not only the latest.
pub fn get_payment_by_reference(conn: &Connection, reference: &str) -> anyhow::Result<Option<Payment>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments
                 WHERE id = (SELECT payment_id FROM payment_references WHERE reference = ?1)"
            ),
            params![reference],
            |row| Ok(parse_payment_row(row)),
        )
        .optional()?;
    result.transpose()
}

/// Records a freshly initialized gateway transaction and moves the payment to
/// `processing`. Refuses to touch a completed or cancelled payment. Earlier
/// references stay resolvable.
pub fn attach_payment_reference(
    conn: &Connection,
    id: i64,
    reference: &str,
    access_code: &str,
) -> anyhow::Result<bool> {
    let registered = conn.execute(
        "INSERT INTO payment_references (reference, payment_id)
         SELECT ?1, id FROM payments WHERE id = ?2 AND status IN ('pending', 'processing', 'failed')",
        params![reference, id],
    )?;
    if registered == 0 {
        return Ok(false);
    }

    let count = conn.execute(
        "UPDATE payments SET reference = ?1, access_code = ?2, status = 'processing', failure_reason = NULL
         WHERE id = ?3 AND status IN ('pending', 'processing', 'failed')",
        params![reference, access_code, id],
    )?;
    Ok(count > 0)
}

/// Compare-and-set to `completed`. Returns false if the payment was already
/// completed (or cancelled), so a duplicate success event changes nothing.
/// `reference` is the one the provider settled, which becomes the payment's
/// current reference.
pub fn complete_payment(
    conn: &Connection,
    id: i64,
    reference: &str,
    transaction_id: Option<&str>,
    gateway_response: &str,
    completed_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments
         SET status = 'completed', reference = ?1, transaction_id = ?2, gateway_response = ?3,
             completed_at = ?4, failure_reason = NULL
         WHERE id = ?5 AND status IN ('pending', 'processing', 'failed')",
        params![reference, transaction_id, gateway_response, fmt_ts(completed_at), id],
    )?;
    Ok(count > 0)
}

/// Compare-and-set to `failed` from any of `from`.
pub fn fail_payment(
    conn: &Connection,
    id: i64,
    from: &[PaymentStatus],
    reason: &str,
    gateway_response: Option<&str>,
) -> anyhow::Result<bool> {
    let names: Vec<&'static str> = from.iter().map(|s| s.as_str()).collect();
    let count = conn.execute(
        &format!(
            "UPDATE payments
             SET status = 'failed', failure_reason = ?1, gateway_response = COALESCE(?2, gateway_response)
             WHERE id = ?3 AND status IN ({})",
            status_list(&names)
        ),
        params![reason, gateway_response, id],
    )?;
    Ok(count > 0)
}

pub fn cancel_open_payment(conn: &Connection, booking_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = 'cancelled'
         WHERE booking_id = ?1 AND status IN ('pending', 'processing', 'failed')",
        params![booking_id],
    )?;
    Ok(count > 0)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let amount: String = row.get(2)?;
    let status: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    let completed_at: Option<String> = row.get(12)?;

    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        amount: parse_decimal(&amount)?,
        email: row.get(3)?,
        phone_number: row.get(4)?,
        reference: row.get(5)?,
        access_code: row.get(6)?,
        transaction_id: row.get(7)?,
        gateway_response: row.get(8)?,
        failure_reason: row.get(9)?,
        status: PaymentStatus::parse(&status),
        created_at: parse_ts(&created_at)?,
        completed_at: parse_opt_ts(completed_at)?,
    })
}

// ── Dashboard ──

pub struct DashboardStats {
    pub total_users: i64,
    pub total_vehicles: i64,
    pub total_bookings: i64,
    pub pending_vehicle_approvals: i64,
    pub pending_license_verifications: i64,
    pub bookings_by_status: Vec<(String, i64)>,
    pub completed_revenue: Decimal,
}

pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };
    let total_users = count("users")?;
    let total_vehicles = count("vehicles")?;
    let total_bookings = count("bookings")?;

    let pending_vehicle_approvals: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vehicles WHERE approval_status = 'pending'",
        [],
        |row| row.get(0),
    )?;

    let pending_license_verifications: i64 = conn.query_row(
        "SELECT COUNT(*) FROM driving_licenses WHERE verification_status = 'pending'",
        [],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    let mut bookings_by_status = vec![];
    for row in rows {
        bookings_by_status.push(row?);
    }

    // Decimal amounts are stored as text, so sum in Rust rather than SQL.
    let mut stmt = conn.prepare("SELECT amount FROM payments WHERE status = 'completed'")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut completed_revenue = Decimal::ZERO;
    for row in rows {
        completed_revenue += parse_decimal(&row?)?;
    }

    Ok(DashboardStats {
        total_users,
        total_vehicles,
        total_bookings,
        pending_vehicle_approvals,
        pending_license_verifications,
        bookings_by_status,
        completed_revenue,
    })
}
