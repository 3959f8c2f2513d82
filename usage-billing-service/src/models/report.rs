//! Usage report shapes.

use super::{Bill, CostProjection, Metric, PlanTier, UsageRecord, UsageTotals};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_records: usize,
    pub days_active: usize,
    pub metrics_used: usize,
    /// Records per active day.
    pub average_daily: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub period: ReportPeriod,
    pub daily_breakdown: BTreeMap<NaiveDate, UsageTotals>,
    pub metric_totals: UsageTotals,
    pub bill: Bill,
    pub stats: ReportStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailStats {
    pub total: Decimal,
    pub average: Decimal,
    pub max: Decimal,
    pub min: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyData {
    pub count: usize,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    pub metric: Metric,
    pub period: DetailPeriod,
    pub stats: DetailStats,
    pub daily_data: BTreeMap<NaiveDate, DailyData>,
    /// Totals by UTC hour of day. Hours without usage are absent.
    pub hourly_pattern: BTreeMap<u32, Decimal>,
    /// At most the first 100 records of the range.
    pub raw_records: Vec<UsageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandInfo {
    pub name: String,
    pub plan: PlanTier,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPeriod {
    pub usage: UsageTotals,
    pub bill: Bill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMetric {
    pub metric: Metric,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub brand: BrandInfo,
    pub current_period: CurrentPeriod,
    pub projections: CostProjection,
    pub top_metrics: Vec<TopMetric>,
    /// Percent change against last month. Metrics unused last month are absent.
    pub trends: BTreeMap<Metric, Decimal>,
    pub insights: Vec<String>,
}
