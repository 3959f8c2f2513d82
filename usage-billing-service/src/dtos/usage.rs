use super::{one, usage_amount};
use crate::models::{BillingPeriodView, Metric, UsageRecord, UsageTotals};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordUsageRequest {
    pub metric: Metric,

    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub value: Decimal,

    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BatchUsageItem {
    pub metric: Metric,

    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub value: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchUsageRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 items"), nested)]
    pub items: Vec<BatchUsageItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchUsageResponse {
    pub count: usize,
    pub records: Vec<UsageRecord>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConsumeRequest {
    pub metric: Metric,

    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub amount: Decimal,

    pub metadata: Option<serde_json::Value>,
}

/// Optional `?amount=` for quota checks. Defaults to one unit.
#[derive(Debug, Deserialize, Validate)]
pub struct AmountParams {
    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AmountRequest {
    #[serde(default = "one")]
    #[validate(custom(function = "usage_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CurrentUsageResponse {
    pub brand_id: Uuid,
    pub period: BillingPeriodView,
    pub usage: UsageTotals,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProviderUsageParams {
    pub metric: Metric,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProviderUsageResponse {
    pub metric: Metric,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total: Decimal,
}
