pub mod billing;
pub mod brands;
pub mod health;
pub mod plans;
pub mod pricing;
pub mod quotas;
pub mod reports;
pub mod usage;

pub use health::{health_check, metrics, readiness_check};
