use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ApprovalStatus, Booking, BookingStatus, DrivingLicense, VerificationStatus, Vehicle};
use crate::services::lifecycle::{self, SweepReport};
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    total_users: i64,
    total_vehicles: i64,
    total_bookings: i64,
    pending_vehicle_approvals: i64,
    pending_license_verifications: i64,
    bookings_by_status: Vec<StatusCount>,
    completed_revenue: Decimal,
}

#[derive(Serialize)]
pub struct StatusCount {
    status: String,
    count: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let stats = {
        let db = state.db()?;
        queries::get_dashboard_stats(&db)?
    };

    Ok(Json(StatusResponse {
        total_users: stats.total_users,
        total_vehicles: stats.total_vehicles,
        total_bookings: stats.total_bookings,
        pending_vehicle_approvals: stats.pending_vehicle_approvals,
        pending_license_verifications: stats.pending_license_verifications,
        bookings_by_status: stats
            .bookings_by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        completed_revenue: stats.completed_revenue,
    }))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let bookings = {
        let db = state.db()?;
        queries::get_all_bookings(&db, query.status, limit)?
    };

    Ok(Json(bookings))
}

// POST /api/admin/bookings/:booking_id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.now();
    let change = {
        let mut db = state.db()?;
        lifecycle::cancel_booking(&mut db, &booking_id, &now)?
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "status": BookingStatus::Cancelled,
        "changed": change.is_some(),
    })))
}

// GET /api/admin/vehicles?status=
#[derive(Deserialize)]
pub struct VehiclesQuery {
    pub status: Option<ApprovalStatus>,
}

/// Every listed vehicle whatever its review state, newest first.
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let vehicles = {
        let db = state.db()?;
        queries::list_vehicles(&db, query.status, None)?
    };

    Ok(Json(vehicles))
}

// GET /api/admin/licenses?status=
#[derive(Deserialize)]
pub struct LicensesQuery {
    pub status: Option<VerificationStatus>,
}

pub async fn list_licenses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LicensesQuery>,
) -> Result<Json<Vec<DrivingLicense>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let licenses = {
        let db = state.db()?;
        queries::list_licenses(&db, query.status)?
    };

    Ok(Json(licenses))
}

// POST /api/admin/vehicles/:id/review
#[derive(Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleAction {
    Approve,
    Decline,
}

#[derive(Deserialize)]
pub struct VehicleReviewRequest {
    pub action: VehicleAction,
    #[serde(default)]
    pub admin_notes: String,
}

pub async fn review_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<VehicleReviewRequest>,
) -> Result<Json<Vehicle>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let notes = body.admin_notes.trim();
    if body.action == VehicleAction::Decline && notes.is_empty() {
        return Err(AppError::validation("please provide a reason for declining this vehicle"));
    }
    let status = match body.action {
        VehicleAction::Approve => ApprovalStatus::Approved,
        VehicleAction::Decline => ApprovalStatus::Declined,
    };

    let now = state.now();
    let vehicle = {
        let db = state.db()?;
        if !queries::review_vehicle(&db, id, status, notes, &now)? {
            return Err(AppError::NotFound(format!("vehicle {id}")));
        }
        queries::get_vehicle(&db, id)?.ok_or_else(|| AppError::NotFound(format!("vehicle {id}")))?
    };

    tracing::info!(vehicle_id = id, status = status.as_str(), "vehicle reviewed");
    Ok(Json(vehicle))
}

// POST /api/admin/licenses/:id/review
#[derive(Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LicenseAction {
    Verify,
    Reject,
}

#[derive(Deserialize)]
pub struct LicenseReviewRequest {
    pub action: LicenseAction,
    #[serde(default)]
    pub admin_notes: String,
}

pub async fn review_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<LicenseReviewRequest>,
) -> Result<Json<DrivingLicense>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let notes = body.admin_notes.trim();
    if body.action == LicenseAction::Reject && notes.is_empty() {
        return Err(AppError::validation("please provide a reason for rejecting this license"));
    }
    let status = match body.action {
        LicenseAction::Verify => VerificationStatus::Verified,
        LicenseAction::Reject => VerificationStatus::Rejected,
    };

    let now = state.now();
    let license = {
        let db = state.db()?;
        if !queries::review_license(&db, id, status, notes, &now)? {
            return Err(AppError::NotFound(format!("license {id}")));
        }
        queries::get_license(&db, id)?.ok_or_else(|| AppError::NotFound(format!("license {id}")))?
    };

    tracing::info!(license_id = id, user_id = %license.user_id, status = status.as_str(), "license reviewed");
    Ok(Json(license))
}

// POST /api/admin/sweep
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.now();
    let report = {
        let mut db = state.db()?;
        lifecycle::sweep(&mut db, &now)?
    };

    Ok(Json(report))
}
