use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::refresh_expired;
use crate::handlers::on_conflict;
use crate::models::{Booking, BookingStatus, User, UserType};
use crate::state::AppState;

// POST /api/users
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub id: Option<String>,
    pub username: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default)]
    pub phone_number: String,
    pub years_of_experience: Option<i64>,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }
    let email = body.email.trim();
    if !email.contains('@') {
        return Err(AppError::validation("a valid email address is required"));
    }
    if matches!(body.years_of_experience, Some(y) if y < 0) {
        return Err(AppError::validation("years of experience cannot be negative"));
    }

    let user = User {
        id: body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        username: username.to_string(),
        email: email.to_string(),
        user_type: body.user_type,
        phone_number: body.phone_number.trim().to_string(),
        years_of_experience: body.years_of_experience,
    };

    {
        let db = state.db()?;
        queries::create_user(&db, &user).map_err(|e| on_conflict(e, "user already exists"))?;
    }

    tracing::info!(user_id = %user.id, user_type = user.user_type.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /api/users/:id/dashboard
const RECENT_BOOKINGS: usize = 5;

#[derive(Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Owner {
        user: User,
        total_vehicles: usize,
        total_bookings: usize,
        total_earnings: Decimal,
        recent_bookings: Vec<Booking>,
    },
    Client {
        user: User,
        total_bookings: usize,
        recent_bookings: Vec<Booking>,
    },
}

/// Per-user summary. Admins use `/api/admin/status` instead.
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Dashboard>, AppError> {
    let now = state.now();
    let db = state.db()?;

    let user = queries::get_user(&db, &user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;

    let dashboard = match user.user_type {
        UserType::Owner => {
            let total_vehicles = queries::list_vehicles_for_owner(&db, &user.id)?.len();
            let bookings = refresh_expired(&db, queries::get_bookings_for_owner(&db, &user.id)?, &now)?;
            let total_earnings = bookings
                .iter()
                .filter(|b| b.status == BookingStatus::Completed)
                .map(|b| b.total_cost)
                .sum();
            Dashboard::Owner {
                total_vehicles,
                total_bookings: bookings.len(),
                total_earnings,
                recent_bookings: bookings.into_iter().take(RECENT_BOOKINGS).collect(),
                user,
            }
        }
        UserType::Client => {
            let bookings = refresh_expired(&db, queries::get_bookings_for_client(&db, &user.id)?, &now)?;
            Dashboard::Client {
                total_bookings: bookings.len(),
                recent_bookings: bookings.into_iter().take(RECENT_BOOKINGS).collect(),
                user,
            }
        }
        UserType::Admin => {
            return Err(AppError::validation("admin summaries are served by /api/admin/status"));
        }
    };
    Ok(Json(dashboard))
}
