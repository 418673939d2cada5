use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{whole_seconds, ApprovalStatus, DriveType, UserType, Vehicle, VehicleCategory, VehicleCondition};
use crate::services::availability;
use crate::services::pricing::{self, CostBreakdown};
use crate::state::AppState;

const OLDEST_MODEL_YEAR: i32 = 1990;

// POST /api/vehicles, PUT /api/vehicles/:id
#[derive(Deserialize)]
pub struct VehicleRequest {
    pub owner_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub category: VehicleCategory,
    pub condition: VehicleCondition,
    #[serde(default)]
    pub mileage: i64,
    pub daily_rate: Decimal,
    #[serde(default)]
    pub description: String,
}

impl VehicleRequest {
    fn validate(&self, now: NaiveDateTime) -> Result<(), AppError> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err(AppError::validation("make and model are required"));
        }
        if self.year < OLDEST_MODEL_YEAR || self.year > now.year() + 1 {
            return Err(AppError::validation(format!("year must be between {OLDEST_MODEL_YEAR} and {}", now.year() + 1)));
        }
        if self.daily_rate <= Decimal::ZERO {
            return Err(AppError::validation("daily rate must be positive"));
        }
        if self.mileage < 0 {
            return Err(AppError::validation("mileage cannot be negative"));
        }
        Ok(())
    }
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let now = state.now();
    body.validate(now)?;

    let mut vehicle = Vehicle {
        id: 0,
        owner_id: body.owner_id,
        make: body.make.trim().to_string(),
        model: body.model.trim().to_string(),
        year: body.year,
        category: body.category,
        condition: body.condition,
        mileage: body.mileage,
        daily_rate: body.daily_rate.round_dp(2),
        description: body.description,
        approval_status: ApprovalStatus::Pending,
        admin_notes: String::new(),
        reviewed_at: None,
        is_available: true,
        created_at: now,
    };

    {
        let db = state.db()?;
        let owner = queries::get_user(&db, &vehicle.owner_id)?
            .ok_or_else(|| AppError::NotFound(format!("user {}", vehicle.owner_id)))?;
        if owner.user_type != UserType::Owner {
            return Err(AppError::validation("only owners can list vehicles"));
        }
        vehicle.id = queries::create_vehicle(&db, &vehicle)?;
    }

    tracing::info!(vehicle_id = vehicle.id, owner_id = %vehicle.owner_id, "vehicle listed for review");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// Owner edit. A declined vehicle goes back to `pending` for another review;
/// existing bookings keep the price they were quoted.
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<VehicleRequest>,
) -> Result<Json<Vehicle>, AppError> {
    let now = state.now();
    body.validate(now)?;

    let db = state.db()?;
    let mut vehicle = match queries::get_vehicle(&db, id)? {
        Some(v) if v.owner_id == body.owner_id => v,
        _ => return Err(AppError::NotFound(format!("vehicle {id}"))),
    };

    vehicle.make = body.make.trim().to_string();
    vehicle.model = body.model.trim().to_string();
    vehicle.year = body.year;
    vehicle.category = body.category;
    vehicle.condition = body.condition;
    vehicle.mileage = body.mileage;
    vehicle.daily_rate = body.daily_rate.round_dp(2);
    vehicle.description = body.description;
    if vehicle.approval_status == ApprovalStatus::Declined {
        vehicle.approval_status = ApprovalStatus::Pending;
    }

    if !queries::update_vehicle_details(&db, &vehicle)? {
        return Err(AppError::NotFound(format!("vehicle {id}")));
    }

    tracing::info!(
        vehicle_id = id,
        owner_id = %vehicle.owner_id,
        status = vehicle.approval_status.as_str(),
        "vehicle updated"
    );
    Ok(Json(vehicle))
}

// GET /api/owners/:owner_id/vehicles
/// All of an owner's vehicles, including ones awaiting review or declined
/// with the admin's notes.
pub async fn list_owner_vehicles(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let db = state.db()?;
    let owner = queries::get_user(&db, &owner_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {owner_id}")))?;
    if owner.user_type != UserType::Owner {
        return Err(AppError::validation("user is not a vehicle owner"));
    }

    Ok(Json(queries::list_vehicles_for_owner(&db, &owner.id)?))
}

// GET /api/vehicles?start_date&end_date&category
#[derive(Deserialize)]
pub struct SearchQuery {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub category: Option<VehicleCategory>,
}

#[derive(Serialize)]
pub struct VehicleListing {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    /// Self-drive cost for the searched range.
    pub estimate: Option<CostBreakdown>,
}

pub async fn search_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<VehicleListing>>, AppError> {
    let range = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => {
            let (start, end) = (whole_seconds(start), whole_seconds(end));
            if end <= start {
                return Err(AppError::validation("end date must be after start date"));
            }
            Some((start, end))
        }
        (None, None) => None,
        _ => return Err(AppError::validation("start_date and end_date must be given together")),
    };

    let db = state.db()?;
    let vehicles = queries::list_vehicles(&db, Some(ApprovalStatus::Approved), query.category)?;

    let mut listings = vec![];
    for vehicle in vehicles {
        let estimate = match &range {
            Some((start, end)) => {
                if !availability::check_dates(&db, &vehicle, start, end, None)? {
                    continue;
                }
                Some(pricing::quote(
                    vehicle.daily_rate,
                    start,
                    end,
                    DriveType::SelfDrive,
                    state.config.chauffeur_daily_rate,
                )?)
            }
            None => None,
        };
        listings.push(VehicleListing { vehicle, estimate });
    }

    Ok(Json(listings))
}

// GET /api/vehicles/:id
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle = {
        let db = state.db()?;
        queries::get_vehicle(&db, id)?
    };

    match vehicle {
        Some(v) if v.is_bookable() => Ok(Json(v)),
        _ => Err(AppError::NotFound(format!("vehicle {id}"))),
    }
}
