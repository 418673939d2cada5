use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Stable external identity used in URLs and gateway metadata.
    pub booking_id: String,
    pub client_id: String,
    pub vehicle_id: i64,
    pub pickup_location_id: i64,
    pub dropoff_location_id: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub drive_type: DriveType,
    pub total_days: i64,
    pub vehicle_cost: Decimal,
    pub chauffeur_cost: Decimal,
    pub total_cost: Decimal,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now > self.end_date
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "active" => BookingStatus::Active,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    /// Statuses that hold the vehicle for their date range.
    pub fn holds_vehicle(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Active)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    #[serde(rename = "self")]
    SelfDrive,
    Chauffeur,
}

impl DriveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveType::SelfDrive => "self",
            DriveType::Chauffeur => "chauffeur",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "chauffeur" => DriveType::Chauffeur,
            _ => DriveType::SelfDrive,
        }
    }
}
