use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::admin::check_auth;
use crate::models::Location;
use crate::state::AppState;

// GET /api/locations
pub async fn list_locations(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Location>>, AppError> {
    let locations = {
        let db = state.db()?;
        queries::list_active_locations(&db)?
    };
    Ok(Json(locations))
}

// POST /api/admin/locations
#[derive(Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub city: String,
}

pub async fn create_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (name, city) = (body.name.trim(), body.city.trim());
    if name.is_empty() || city.is_empty() {
        return Err(AppError::validation("name and city are required"));
    }

    let id = {
        let db = state.db()?;
        queries::create_location(&db, name, city)?
    };

    Ok((
        StatusCode::CREATED,
        Json(Location {
            id,
            name: name.to_string(),
            city: city.to_string(),
            is_active: true,
        }),
    ))
}
