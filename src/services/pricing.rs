use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::DriveType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub total_days: i64,
    pub vehicle_cost: Decimal,
    pub chauffeur_cost: Decimal,
    pub total_cost: Decimal,
}

/// Number of whole calendar days between the two dates, never less than one.
pub fn rental_days(start: &NaiveDateTime, end: &NaiveDateTime) -> i64 {
    (end.date() - start.date()).num_days().max(1)
}

pub fn quote(
    daily_rate: Decimal,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    drive_type: DriveType,
    chauffeur_daily_rate: Decimal,
) -> Result<CostBreakdown, AppError> {
    if daily_rate <= Decimal::ZERO {
        return Err(AppError::validation("daily rate must be positive"));
    }
    if end <= start {
        return Err(AppError::validation("end date must be after start date"));
    }

    let total_days = rental_days(start, end);
    let days = Decimal::from(total_days);
    let vehicle_cost = daily_rate * days;
    let chauffeur_cost = match drive_type {
        DriveType::Chauffeur => chauffeur_daily_rate * days,
        DriveType::SelfDrive => Decimal::ZERO,
    };

    Ok(CostBreakdown {
        total_days,
        vehicle_cost,
        chauffeur_cost,
        total_cost: vehicle_cost + chauffeur_cost,
    })
}
