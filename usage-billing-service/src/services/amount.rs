//! Checked decimal arithmetic and percent formatting for amounts derived
//! from request input.

use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

fn too_large() -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Amount too large"))
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_add(b).ok_or_else(too_large)
}

pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_sub(b).ok_or_else(too_large)
}

pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_mul(b).ok_or_else(too_large)
}

pub fn div(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_div(b).ok_or_else(too_large)
}

pub fn sum<I>(values: I) -> Result<Decimal, AppError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, add)
}

/// `value - limit`, floored at zero.
pub fn excess(value: Decimal, limit: Decimal) -> Result<Decimal, AppError> {
    Ok(sub(value, limit)?.max(Decimal::ZERO))
}

/// Whole percent for display, halves rounded away from zero.
pub fn whole_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
