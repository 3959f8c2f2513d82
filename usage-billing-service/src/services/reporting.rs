//! Usage reports: monthly breakdowns, CSV export, per-metric detail and the
//! executive summary.

use crate::models::{
    Brand, BrandInfo, CostProjection, CurrentPeriod, DailyData, DetailPeriod, DetailStats,
    ExecutiveSummary, ListUsageFilter, Metric, MetricDetail, MonthlyReport, ReportPeriod,
    ReportStats, TopMetric, UsageRecord, UsageTotals,
};
use crate::services::amount;
use crate::services::billing::{compute_bill, BillingCalculator};
use crate::services::catalog::PlanCatalog;
use crate::services::metering::UsageMeter;
use crate::services::period::BillingPeriod;
use crate::services::store::{BrandStore, UsageStore};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub const CSV_HEADER: &str = "Date,Time,Metric,Value,Unit,Metadata";

const RAW_RECORD_LIMIT: usize = 100;
const TOP_METRICS: usize = 5;
const PROJECTION_DAYS: u32 = 30;
const HIGH_ACTIVITY: i64 = 1000;
const OVERAGE_INSIGHT_CENTS: i64 = 5000;

/// Per-day and whole-range totals of `records`, keyed by UTC date.
pub fn aggregate_daily(records: &[UsageRecord]) -> (BTreeMap<NaiveDate, UsageTotals>, UsageTotals) {
    let mut daily: BTreeMap<NaiveDate, UsageTotals> = BTreeMap::new();
    let mut totals = UsageTotals::new();
    for record in records {
        *daily
            .entry(record.timestamp.date_naive())
            .or_default()
            .entry(record.metric)
            .or_insert(Decimal::ZERO) += record.value;
        *totals.entry(record.metric).or_insert(Decimal::ZERO) += record.value;
    }
    (daily, totals)
}

pub fn report_stats(
    records: &[UsageRecord],
    daily: &BTreeMap<NaiveDate, UsageTotals>,
    totals: &UsageTotals,
) -> ReportStats {
    let average_daily = if daily.is_empty() {
        Decimal::ZERO
    } else {
        (Decimal::from(records.len()) / Decimal::from(daily.len())).round_dp(2)
    };
    ReportStats {
        total_records: records.len(),
        days_active: daily.len(),
        metrics_used: totals.len(),
        average_daily,
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders records as CSV, one line per record in the given order.
pub fn render_csv(records: &[UsageRecord]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for record in records {
        let metadata = record
            .metadata
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "{}".to_string());
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            record.timestamp.format("%Y-%m-%d"),
            record.timestamp.format("%H:%M:%S"),
            record.metric,
            record.value.normalize(),
            record.metric.unit(),
            csv_field(&metadata),
        ));
    }
    csv
}

pub fn detail(
    metric: Metric,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    records: Vec<UsageRecord>,
) -> MetricDetail {
    let count = records.len();
    let total: Decimal = records.iter().map(|r| r.value).sum();
    let average = if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    };
    let max = records.iter().map(|r| r.value).max().unwrap_or(Decimal::ZERO);
    let min = records.iter().map(|r| r.value).min().unwrap_or(Decimal::ZERO);

    let mut daily_data: BTreeMap<NaiveDate, DailyData> = BTreeMap::new();
    let mut hourly_pattern: BTreeMap<u32, Decimal> = BTreeMap::new();
    for record in &records {
        let day = daily_data
            .entry(record.timestamp.date_naive())
            .or_insert(DailyData {
                count: 0,
                total: Decimal::ZERO,
            });
        day.count += 1;
        day.total += record.value;
        *hourly_pattern
            .entry(record.timestamp.hour())
            .or_insert(Decimal::ZERO) += record.value;
    }

    let mut raw_records = records;
    raw_records.truncate(RAW_RECORD_LIMIT);

    MetricDetail {
        metric,
        period: DetailPeriod { start, end },
        stats: DetailStats {
            total,
            average,
            max,
            min,
            count,
        },
        daily_data,
        hourly_pattern,
        raw_records,
    }
}

/// Highest-usage metrics, largest first.
pub fn top_metrics(usage: &UsageTotals, limit: usize) -> Vec<TopMetric> {
    let mut top: Vec<TopMetric> = usage
        .iter()
        .map(|(metric, value)| TopMetric {
            metric: *metric,
            value: *value,
        })
        .collect();
    top.sort_by(|a, b| b.value.cmp(&a.value));
    top.truncate(limit);
    top
}

/// Percent change per metric against `previous`. Metrics unused in `previous` are skipped.
pub fn trends(
    current: &UsageTotals,
    previous: &UsageTotals,
) -> Result<BTreeMap<Metric, Decimal>, AppError> {
    let mut trends = BTreeMap::new();
    for (metric, value) in current {
        let last = previous.get(metric).copied().unwrap_or(Decimal::ZERO);
        if last > Decimal::ZERO {
            let ratio = amount::div(amount::sub(*value, last)?, last)?;
            trends.insert(*metric, amount::mul(ratio, Decimal::ONE_HUNDRED)?.round_dp(2));
        }
    }
    Ok(trends)
}

pub fn insights(
    usage: &UsageTotals,
    trends: &BTreeMap<Metric, Decimal>,
    projection: &CostProjection,
) -> Vec<String> {
    let mut insights = Vec::new();

    for (metric, change) in trends {
        if *change > Decimal::from(50) {
            insights.push(format!(
                "{} has increased by {}% compared to last month",
                metric,
                amount::whole_percent(*change)
            ));
        } else if *change < Decimal::from(-30) {
            insights.push(format!(
                "{} has decreased by {}% compared to last month",
                metric,
                amount::whole_percent(change.abs())
            ));
        }
    }

    if projection.projected_overage > Decimal::from(OVERAGE_INSIGHT_CENTS) {
        insights.push(format!(
            "Projected overage costs: €{:.2}. Consider upgrading your plan.",
            projection.projected_overage / Decimal::ONE_HUNDRED
        ));
    }

    let total: Decimal = usage.values().copied().sum();
    if total.is_zero() {
        insights.push("You haven't used any resources this month. Start creating!".to_string());
    } else if total > Decimal::from(HIGH_ACTIVITY) {
        insights.push("High activity detected! Your platform is thriving.".to_string());
    }

    insights.extend(projection.recommendations.iter().cloned());
    insights
}

pub struct UsageReporter {
    catalog: Arc<PlanCatalog>,
    brands: Arc<dyn BrandStore>,
    usage: Arc<dyn UsageStore>,
    meter: Arc<UsageMeter>,
    billing: Arc<BillingCalculator>,
}

impl UsageReporter {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        brands: Arc<dyn BrandStore>,
        usage: Arc<dyn UsageStore>,
        meter: Arc<UsageMeter>,
        billing: Arc<BillingCalculator>,
    ) -> Self {
        Self {
            catalog,
            brands,
            usage,
            meter,
            billing,
        }
    }

    async fn brand(&self, brand_id: Uuid) -> Result<Brand, AppError> {
        self.brands
            .get_brand(brand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Brand not found")))
    }

    fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
        if end < start {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "End date must not be before start date"
            )));
        }
        Ok(())
    }

    /// Daily breakdown and bill of one calendar month.
    #[instrument(skip(self))]
    pub async fn monthly_report(
        &self,
        brand_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReport, AppError> {
        let period = BillingPeriod::month(year, month).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Invalid month {}-{}", year, month))
        })?;
        let brand = self.brand(brand_id).await?;

        let records = self.usage.list_usage(brand_id, &period.usage_filter()).await?;
        let (daily_breakdown, metric_totals) = aggregate_daily(&records);
        let stats = report_stats(&records, &daily_breakdown, &metric_totals);

        let bill = compute_bill(
            self.catalog.plan(brand.tier()),
            &metric_totals,
            self.catalog.tax_rate(brand.country_code()),
            period,
        )?;

        Ok(MonthlyReport {
            period: ReportPeriod {
                year,
                month,
                start: period.start,
                end: period.end,
            },
            daily_breakdown,
            metric_totals,
            bill,
            stats,
        })
    }

    #[instrument(skip(self))]
    pub async fn export_csv(
        &self,
        brand_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, AppError> {
        Self::check_range(start, end)?;
        self.brand(brand_id).await?;

        let records = self
            .usage
            .list_usage(brand_id, &ListUsageFilter::between(start, end))
            .await?;
        tracing::info!(brand_id = %brand_id, rows = records.len(), "Usage exported");
        Ok(render_csv(&records))
    }

    #[instrument(skip(self))]
    pub async fn metric_detail(
        &self,
        brand_id: Uuid,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MetricDetail, AppError> {
        Self::check_range(start, end)?;
        self.brand(brand_id).await?;

        let records = self
            .usage
            .list_usage(
                brand_id,
                &ListUsageFilter::between(start, end).for_metric(metric),
            )
            .await?;
        Ok(detail(metric, start, end, records))
    }

    #[instrument(skip(self))]
    pub async fn executive_summary(&self, brand_id: Uuid) -> Result<ExecutiveSummary, AppError> {
        let brand = self.brand(brand_id).await?;

        let usage = self.meter.current_usage(brand_id).await?;
        let bill = self.billing.current_bill(brand_id).await?;
        let projections = self.billing.project_costs(brand_id, PROJECTION_DAYS).await?;

        let previous = BillingPeriod::containing(Utc::now()).previous();
        let last_month = self.usage.list_usage(brand_id, &previous.usage_filter()).await?;
        let (_, last_totals) = aggregate_daily(&last_month);

        let trends = trends(&usage, &last_totals)?;
        let insights = insights(&usage, &trends, &projections);
        tracing::debug!(
            brand_id = %brand_id,
            active_metrics = usage.len(),
            insights = insights.len(),
            "Executive summary built"
        );

        Ok(ExecutiveSummary {
            brand: BrandInfo {
                name: brand.name.clone(),
                plan: brand.tier(),
                member_since: brand.created_utc,
            },
            top_metrics: top_metrics(&usage, TOP_METRICS),
            current_period: CurrentPeriod { usage, bill },
            projections,
            trends,
            insights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(metric: Metric, value: i64, at: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            timestamp: at,
            ..UsageRecord::new(Uuid::nil(), metric, Decimal::from(value), None)
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 15, 30).unwrap()
    }

    fn projection(overage: i64, recommendations: Vec<String>) -> CostProjection {
        CostProjection {
            days: 30,
            current_daily: Decimal::ZERO,
            projected_monthly: Decimal::ZERO,
            projected_overage: Decimal::from(overage),
            projected_usage: BTreeMap::new(),
            recommendations,
        }
    }

    #[test]
    fn daily_breakdown_and_stats() {
        let records = vec![
            record(Metric::DesignsCreated, 2, at(3, 9)),
            record(Metric::Renders2d, 5, at(3, 10)),
            record(Metric::DesignsCreated, 1, at(3, 23)),
            record(Metric::DesignsCreated, 4, at(7, 0)),
        ];

        let (daily, totals) = aggregate_daily(&records);
        let day3 = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(daily[&day3][&Metric::DesignsCreated], Decimal::from(3));
        assert_eq!(daily[&day3][&Metric::Renders2d], Decimal::from(5));
        assert_eq!(totals[&Metric::DesignsCreated], Decimal::from(7));

        let stats = report_stats(&records, &daily, &totals);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.days_active, 2);
        assert_eq!(stats.metrics_used, 2);
        assert_eq!(stats.average_daily, Decimal::from(2));
    }

    #[test]
    fn empty_month_has_zero_average() {
        let (daily, totals) = aggregate_daily(&[]);
        let stats = report_stats(&[], &daily, &totals);
        assert_eq!(stats.days_active, 0);
        assert_eq!(stats.average_daily, Decimal::ZERO);
    }

    #[test]
    fn csv_rows_quote_metadata() {
        let mut tagged = record(Metric::Renders3d, 2, at(5, 14));
        tagged.metadata = Some(json!({"scene": "a", "quality": "high"}));
        let csv = render_csv(&[record(Metric::StorageGb, 3, at(4, 8)), tagged]);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2025-03-04,08:15:30,storage_gb,3,GB,{}");
        assert_eq!(
            lines[2],
            r#"2025-03-05,14:15:30,renders_3d,2,renders,"{""quality"":""high"",""scene"":""a""}""#
        );
    }

    #[test]
    fn detail_of_empty_range_is_all_zero() {
        let detail = detail(Metric::ApiCalls, at(1, 0), at(31, 0), vec![]);
        assert_eq!(detail.stats.count, 0);
        assert_eq!(detail.stats.min, Decimal::ZERO);
        assert_eq!(detail.stats.max, Decimal::ZERO);
        assert_eq!(detail.stats.average, Decimal::ZERO);
        assert!(detail.hourly_pattern.is_empty());
    }

    #[test]
    fn detail_groups_by_day_and_hour() {
        let records = vec![
            record(Metric::ApiCalls, 10, at(2, 9)),
            record(Metric::ApiCalls, 30, at(2, 9)),
            record(Metric::ApiCalls, 20, at(3, 17)),
        ];
        let detail = detail(Metric::ApiCalls, at(1, 0), at(31, 0), records);

        assert_eq!(detail.stats.total, Decimal::from(60));
        assert_eq!(detail.stats.average, Decimal::from(20));
        assert_eq!(detail.stats.max, Decimal::from(30));
        assert_eq!(detail.stats.min, Decimal::from(10));
        let day2 = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(detail.daily_data[&day2].count, 2);
        assert_eq!(detail.hourly_pattern[&9], Decimal::from(40));
        assert_eq!(detail.hourly_pattern[&17], Decimal::from(20));
        assert_eq!(detail.raw_records.len(), 3);
    }

    #[test]
    fn raw_records_are_capped() {
        let records = (0..150)
            .map(|_| record(Metric::ApiCalls, 1, at(2, 9)))
            .collect();
        let detail = detail(Metric::ApiCalls, at(1, 0), at(31, 0), records);
        assert_eq!(detail.stats.count, 150);
        assert_eq!(detail.raw_records.len(), 100);
    }

    #[test]
    fn trends_skip_metrics_new_this_month() {
        let current = UsageTotals::from([
            (Metric::DesignsCreated, Decimal::from(30)),
            (Metric::Renders2d, Decimal::from(6)),
            (Metric::ApiCalls, Decimal::from(500)),
        ]);
        let previous = UsageTotals::from([
            (Metric::DesignsCreated, Decimal::from(10)),
            (Metric::Renders2d, Decimal::from(20)),
        ]);

        let trends = trends(&current, &previous).unwrap();
        assert_eq!(trends[&Metric::DesignsCreated], Decimal::from(200));
        assert_eq!(trends[&Metric::Renders2d], Decimal::from(-70));
        assert!(!trends.contains_key(&Metric::ApiCalls));

        let insights = insights(&current, &trends, &projection(0, vec![]));
        assert_eq!(
            insights,
            vec![
                "designs_created has increased by 200% compared to last month".to_string(),
                "renders_2d has decreased by 70% compared to last month".to_string(),
            ]
        );
    }

    #[test]
    fn trend_insights_round_halves_up() {
        let current = UsageTotals::from([(Metric::Renders2d, Decimal::from(13))]);
        let previous = UsageTotals::from([(Metric::Renders2d, Decimal::from(8))]);

        let trends = trends(&current, &previous).unwrap();
        assert_eq!(trends[&Metric::Renders2d], Decimal::new(625, 1));

        let insights = insights(&current, &trends, &projection(0, vec![]));
        assert_eq!(
            insights[0],
            "renders_2d has increased by 63% compared to last month"
        );
    }

    #[test]
    fn insights_for_idle_brand_with_projected_overage() {
        let recommendation = "renders_2d will reach 120% of quota. Consider upgrading.".to_string();
        let insights = insights(
            &UsageTotals::new(),
            &BTreeMap::new(),
            &projection(6250, vec![recommendation.clone()]),
        );
        assert_eq!(
            insights,
            vec![
                "Projected overage costs: €62.50. Consider upgrading your plan.".to_string(),
                "You haven't used any resources this month. Start creating!".to_string(),
                recommendation,
            ]
        );
    }

    #[test]
    fn top_metrics_largest_first() {
        let usage: UsageTotals = Metric::ALL
            .iter()
            .enumerate()
            .map(|(i, m)| (*m, Decimal::from(i as i64)))
            .collect();
        let top = top_metrics(&usage, 5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].metric, *Metric::ALL.last().unwrap());
        assert!(top.windows(2).all(|w| w[0].value >= w[1].value));
    }
}
