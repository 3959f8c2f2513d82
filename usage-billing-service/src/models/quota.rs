//! Quota decisions and usage summaries.

use super::{Metric, PlanTier};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Limit and remaining reported for metrics the plan does not meter.
pub const UNLIMITED: i64 = 999_999;

/// Outcome of checking one request against a quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub remaining: Decimal,
    pub limit: Decimal,
    pub overage: Decimal,
    pub will_charge: bool,
    /// Cents billed for the overage this request would cause.
    pub estimated_cost: Decimal,
}

impl QuotaCheck {
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: Decimal::from(UNLIMITED),
            limit: Decimal::from(UNLIMITED),
            overage: Decimal::ZERO,
            will_charge: false,
            estimated_cost: Decimal::ZERO,
        }
    }

    pub fn used(&self) -> Decimal {
        self.limit - self.remaining
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricUsage {
    #[serde(rename = "type")]
    pub metric: Metric,
    pub current: Decimal,
    pub limit: Decimal,
    /// Percent of the limit consumed, capped at 100.
    pub percentage: Decimal,
    pub overage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedCost {
    pub base: Decimal,
    pub usage: Decimal,
    pub overage: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaAlert {
    pub severity: AlertSeverity,
    pub message: String,
    pub metric: Metric,
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: String,
}

/// Month-to-date usage of a brand measured against its plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub brand_id: Uuid,
    pub plan: PlanTier,
    pub period: SummaryPeriod,
    pub metrics: Vec<MetricUsage>,
    pub estimated_cost: EstimatedCost,
    pub alerts: Vec<QuotaAlert>,
}
