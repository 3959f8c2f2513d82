use super::{one, usage_amount};
use crate::models::Metric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct EstimateParams {
    pub metric: Metric,

    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProjectionParams {
    #[validate(range(min = 1, max = 366, message = "Days must be between 1 and 366"))]
    pub days: Option<u32>,
}

impl ProjectionParams {
    pub fn days(&self) -> u32 {
        self.days.unwrap_or(30)
    }
}

#[derive(Debug, Serialize)]
pub struct TaxRateResponse {
    pub country: String,
    pub tax_rate: Decimal,
}
