//! Bills, estimates, projections and plan comparisons. Amounts are in cents.

use super::{Metric, PlanTier};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriodView {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One quota line of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLine {
    pub metric: Metric,
    pub quantity: Decimal,
    pub limit: Decimal,
    pub overage: Decimal,
    pub unit_price: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub plan: PlanTier,
    pub period: BillingPeriodView,
    pub base_price: Decimal,
    pub usage_costs: BTreeMap<Metric, Decimal>,
    pub total_usage_cost: Decimal,
    pub overage_costs: BTreeMap<Metric, Decimal>,
    pub total_overage_cost: Decimal,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub breakdown: Vec<BillLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEstimate {
    pub metric: Metric,
    pub quantity: Decimal,
    pub current_usage: Decimal,
    pub limit: Decimal,
    pub will_exceed: bool,
    pub overage_amount: Decimal,
    pub unit_price: Decimal,
    pub estimated_cost: Decimal,
    pub total_after: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostProjection {
    pub days: u32,
    pub current_daily: Decimal,
    pub projected_monthly: Decimal,
    pub projected_overage: Decimal,
    pub projected_usage: BTreeMap<Metric, Decimal>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanComparison {
    pub plan: PlanTier,
    pub base_price: Decimal,
    pub estimated_overage: Decimal,
    pub total: Decimal,
    pub savings: Decimal,
    pub recommendation: String,
}
