pub mod billing;
pub mod brands;
pub mod pricing;
pub mod reports;
pub mod usage;

pub use billing::{EstimateParams, ProjectionParams, TaxRateResponse};
pub use brands::UpsertBrandRequest;
pub use pricing::{CostPriceRequest, PriceQuoteRequest};
pub use reports::{DateRangeParams, MonthlyReportParams};
pub use usage::{
    AmountParams, AmountRequest, BatchUsageItem, BatchUsageRequest, BatchUsageResponse,
    ConsumeRequest, CurrentUsageResponse, ProviderUsageParams, ProviderUsageResponse,
    RecordUsageRequest,
};

use crate::models::MAX_USAGE_VALUE;
use rust_decimal::Decimal;
use validator::ValidationError;

pub(crate) fn one() -> Decimal {
    Decimal::ONE
}

/// Accepts amounts in `[0, MAX_USAGE_VALUE)`.
pub(crate) fn usage_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Value must be non-negative".into());
        return Err(err);
    }
    if *value >= MAX_USAGE_VALUE {
        let mut err = ValidationError::new("too_large");
        err.message = Some(format!("Value must be less than {}", MAX_USAGE_VALUE).into());
        return Err(err);
    }
    Ok(())
}
