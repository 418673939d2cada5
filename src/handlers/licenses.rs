use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{DrivingLicense, UserType};
use crate::state::AppState;

// POST /api/licenses
#[derive(Deserialize)]
pub struct UploadLicenseRequest {
    pub user_id: String,
    pub license_number: String,
    pub expiry_date: NaiveDate,
}

/// Stores license details for review. A re-upload resets verification.
pub async fn upload_license(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UploadLicenseRequest>,
) -> Result<(StatusCode, Json<DrivingLicense>), AppError> {
    let now = state.now();

    let license_number = body.license_number.trim();
    if license_number.is_empty() {
        return Err(AppError::validation("license number is required"));
    }
    if body.expiry_date < now.date() {
        return Err(AppError::validation("license has already expired"));
    }

    let license = {
        let db = state.db()?;
        let user = queries::get_user(&db, &body.user_id)?
            .ok_or_else(|| AppError::NotFound(format!("user {}", body.user_id)))?;
        if user.user_type != UserType::Client {
            return Err(AppError::validation("only clients can upload a driving license"));
        }

        queries::upsert_license(&db, &user.id, license_number, &body.expiry_date, &now)?;
        queries::get_license_for_user(&db, &user.id)?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("license for {} missing after upsert", user.id)))?
    };

    tracing::info!(user_id = %license.user_id, "driving license uploaded, awaiting verification");
    Ok((StatusCode::CREATED, Json(license)))
}
