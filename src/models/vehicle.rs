use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub owner_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub category: VehicleCategory,
    pub condition: VehicleCondition,
    pub mileage: i64,
    pub daily_rate: Decimal,
    pub description: String,
    pub approval_status: ApprovalStatus,
    pub admin_notes: String,
    pub reviewed_at: Option<NaiveDateTime>,
    /// Cached derivation of the booking set. Informational only.
    pub is_available: bool,
    pub created_at: NaiveDateTime,
}

impl Vehicle {
    pub fn is_bookable(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }

    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Declined,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => ApprovalStatus::Approved,
            "declined" => ApprovalStatus::Declined,
            _ => ApprovalStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Sedan,
    Suv,
    Hatchback,
    Pickup,
    Van,
    Luxury,
}

impl VehicleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCategory::Sedan => "sedan",
            VehicleCategory::Suv => "suv",
            VehicleCategory::Hatchback => "hatchback",
            VehicleCategory::Pickup => "pickup",
            VehicleCategory::Van => "van",
            VehicleCategory::Luxury => "luxury",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "suv" => VehicleCategory::Suv,
            "hatchback" => VehicleCategory::Hatchback,
            "pickup" => VehicleCategory::Pickup,
            "van" => VehicleCategory::Van,
            "luxury" => VehicleCategory::Luxury,
            _ => VehicleCategory::Sedan,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCondition {
    Excellent,
    Good,
    Fair,
}

impl VehicleCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCondition::Excellent => "excellent",
            VehicleCondition::Good => "good",
            VehicleCondition::Fair => "fair",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "excellent" => VehicleCondition::Excellent,
            "fair" => VehicleCondition::Fair,
            _ => VehicleCondition::Good,
        }
    }
}
