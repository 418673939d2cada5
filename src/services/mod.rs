pub mod availability;
pub mod checkout;
pub mod lifecycle;
pub mod payments;
pub mod pricing;
pub mod reconciler;
