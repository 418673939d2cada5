pub mod booking;
pub mod license;
pub mod location;
pub mod payment;
pub mod user;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, DriveType};
pub use license::{DrivingLicense, VerificationStatus};
pub use location::Location;
pub use payment::{Payment, PaymentStatus};
pub use user::{User, UserType};
pub use vehicle::{ApprovalStatus, Vehicle, VehicleCategory, VehicleCondition};

use chrono::{NaiveDateTime, SubsecRound};

/// Storage and wire format for naive UTC timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drops sub-second precision, which storage does not keep. Request times pass
/// through here before they are compared.
pub fn whole_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.trunc_subsecs(0)
}
