//! Bill computation, action estimates, projections and plan comparison.
//! All amounts are in cents.

use crate::models::{
    ActionEstimate, Bill, BillLine, Brand, CostProjection, ListUsageFilter, Metric, PlanComparison,
    PlanLimits, UsageRecord, UsageTotals, UNLIMITED,
};
use crate::services::amount;
use crate::services::catalog::PlanCatalog;
use crate::services::metering::UsageMeter;
use crate::services::period::BillingPeriod;
use crate::services::store::{BrandStore, UsageStore};
use chrono::{Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Days of history behind a projection.
const PROJECTION_WINDOW_DAYS: i64 = 7;

/// Savings gap beyond which an alternative plan is flagged as expensive.
const EXPENSIVE_GAP_CENTS: i64 = 5000;

fn usage_of(usage: &UsageTotals, metric: Metric) -> Decimal {
    usage.get(&metric).copied().unwrap_or(Decimal::ZERO)
}

/// Overage cost of `usage` under `plan`, counting only `charge` quotas.
fn overage_cost(plan: &PlanLimits, usage: &UsageTotals) -> Result<Decimal, AppError> {
    plan.quotas
        .iter()
        .filter(|q| q.charges_overage())
        .try_fold(Decimal::ZERO, |total, q| {
            let overage = amount::excess(usage_of(usage, q.metric), q.limit)?;
            amount::add(total, amount::mul(overage, q.rate())?)
        })
}

/// Itemizes `usage` against `plan`. Tax is applied to the subtotal and the
/// total rounded once, half away from zero.
pub fn compute_bill(
    plan: &PlanLimits,
    usage: &UsageTotals,
    tax_rate: Decimal,
    period: BillingPeriod,
) -> Result<Bill, AppError> {
    let mut overage_costs = BTreeMap::new();
    let mut breakdown = Vec::with_capacity(plan.quotas.len());

    for quota in &plan.quotas {
        let quantity = usage_of(usage, quota.metric);
        let overage = amount::excess(quantity, quota.limit)?;
        let unit_price = quota.rate();

        let cost = if overage > Decimal::ZERO && quota.charges_overage() {
            let cost = amount::mul(overage, unit_price)?;
            overage_costs.insert(quota.metric, cost);
            cost
        } else {
            Decimal::ZERO
        };

        breakdown.push(BillLine {
            metric: quota.metric,
            quantity,
            limit: quota.limit,
            overage,
            unit_price,
            cost,
        });
    }

    let total_usage_cost = Decimal::ZERO;
    let total_overage_cost = amount::sum(overage_costs.values().copied())?;
    let subtotal = amount::sum([plan.base_price, total_usage_cost, total_overage_cost])?;
    let total = amount::mul(subtotal, Decimal::ONE + tax_rate)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    Ok(Bill {
        plan: plan.plan,
        period: period.view(),
        base_price: plan.base_price,
        usage_costs: BTreeMap::new(),
        total_usage_cost,
        overage_costs,
        total_overage_cost,
        subtotal,
        tax_rate,
        tax: total - subtotal,
        total,
        breakdown,
    })
}

/// Cost of adding `quantity` units of `metric` on top of `used`.
pub fn estimate_action(
    plan: &PlanLimits,
    metric: Metric,
    used: Decimal,
    quantity: Decimal,
    current_total: Decimal,
) -> Result<ActionEstimate, AppError> {
    let Some(quota) = plan.quota(metric) else {
        return Ok(ActionEstimate {
            metric,
            quantity,
            current_usage: used,
            limit: Decimal::from(UNLIMITED),
            will_exceed: false,
            overage_amount: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            estimated_cost: Decimal::ZERO,
            total_after: current_total,
        });
    };

    let after = amount::add(used, quantity)?;
    let will_exceed = after > quota.limit;
    let overage_amount = amount::excess(after, quota.limit)?;
    let unit_price = quota.rate();
    let estimated_cost = if will_exceed {
        amount::mul(overage_amount, unit_price)?
    } else {
        Decimal::ZERO
    };

    Ok(ActionEstimate {
        metric,
        quantity,
        current_usage: used,
        limit: quota.limit,
        will_exceed,
        overage_amount,
        unit_price,
        estimated_cost,
        total_after: amount::add(current_total, estimated_cost)?,
    })
}

/// Extrapolates the last week of `recent` usage over `days`.
pub fn project(
    plan: &PlanLimits,
    recent: &[UsageRecord],
    days: u32,
    days_in_month: i64,
    current_overage_cost: Decimal,
) -> Result<CostProjection, AppError> {
    let window = Decimal::from(PROJECTION_WINDOW_DAYS);
    let mut sums = UsageTotals::new();
    for record in recent {
        let sum = sums.entry(record.metric).or_insert(Decimal::ZERO);
        *sum = amount::add(*sum, record.value)?;
    }

    let mut projected_usage = BTreeMap::new();
    let mut projected_overage = Decimal::ZERO;
    let mut recommendations = Vec::new();

    for quota in &plan.quotas {
        let daily_average = usage_of(&sums, quota.metric) / window;
        let projected = amount::mul(daily_average, Decimal::from(days))?;
        projected_usage.insert(quota.metric, projected.round_dp(2));

        if !quota.limit.is_zero() && projected > quota.limit * Decimal::new(9, 1) {
            let ratio = amount::mul(projected / quota.limit, Decimal::ONE_HUNDRED)?;
            let percent = amount::whole_percent(ratio);
            recommendations.push(format!(
                "{} will reach {}% of quota. Consider upgrading.",
                quota.metric, percent
            ));
        }

        if projected > quota.limit && quota.charges_overage() {
            let cost = amount::mul(projected - quota.limit, quota.rate())?;
            projected_overage = amount::add(projected_overage, cost)?;
        }
    }

    let current_daily = if days_in_month > 0 {
        current_overage_cost / Decimal::from(days_in_month)
    } else {
        Decimal::ZERO
    };
    let projected_overage = projected_overage.round_dp(2);

    Ok(CostProjection {
        days,
        current_daily: current_daily.round_dp(2),
        projected_monthly: amount::add(plan.base_price, projected_overage)?,
        projected_overage,
        projected_usage,
        recommendations,
    })
}

/// Prices `usage` under every plan, cheapest first.
pub fn compare(
    plans: &[PlanLimits],
    usage: &UsageTotals,
) -> Result<Vec<PlanComparison>, AppError> {
    let mut priced = plans
        .iter()
        .map(|p| {
            let overage = overage_cost(p, usage)?;
            Ok((p, overage, amount::add(p.base_price, overage)?))
        })
        .collect::<Result<Vec<(&PlanLimits, Decimal, Decimal)>, AppError>>()?;
    priced.sort_by_key(|(_, _, total)| *total);

    let cheapest = priced
        .first()
        .map(|(_, _, total)| *total)
        .unwrap_or(Decimal::ZERO);

    Ok(priced
        .into_iter()
        .enumerate()
        .map(|(i, (plan, overage, total))| {
            let savings = total - cheapest;
            let recommendation = if i == 0 {
                "Best value for your usage"
            } else if savings > Decimal::from(EXPENSIVE_GAP_CENTS) {
                "Significantly more expensive"
            } else {
                "Acceptable alternative"
            };
            PlanComparison {
                plan: plan.plan,
                base_price: plan.base_price,
                estimated_overage: overage,
                total,
                savings,
                recommendation: recommendation.to_string(),
            }
        })
        .collect())
}

pub struct BillingCalculator {
    catalog: Arc<PlanCatalog>,
    brands: Arc<dyn BrandStore>,
    usage: Arc<dyn UsageStore>,
    meter: Arc<UsageMeter>,
}

impl BillingCalculator {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        brands: Arc<dyn BrandStore>,
        usage: Arc<dyn UsageStore>,
        meter: Arc<UsageMeter>,
    ) -> Self {
        Self {
            catalog,
            brands,
            usage,
            meter,
        }
    }

    async fn brand(&self, brand_id: Uuid) -> Result<Brand, AppError> {
        self.brands
            .get_brand(brand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Brand not found")))
    }

    #[instrument(skip(self))]
    pub async fn current_bill(&self, brand_id: Uuid) -> Result<Bill, AppError> {
        let brand = self.brand(brand_id).await?;
        let plan = self.catalog.plan(brand.tier());
        let usage = self.meter.current_usage(brand_id).await?;
        let tax_rate = self.catalog.tax_rate(brand.country_code());

        let bill = compute_bill(plan, &usage, tax_rate, BillingPeriod::containing(Utc::now()))?;
        tracing::debug!(
            brand_id = %brand_id,
            subtotal = %bill.subtotal,
            total = %bill.total,
            "Bill calculated"
        );
        Ok(bill)
    }

    #[instrument(skip(self))]
    pub async fn estimate_action_cost(
        &self,
        brand_id: Uuid,
        metric: Metric,
        quantity: Decimal,
    ) -> Result<ActionEstimate, AppError> {
        let brand = self.brand(brand_id).await?;
        let plan = self.catalog.plan(brand.tier());
        let usage = self.meter.current_usage(brand_id).await?;
        let bill = self.current_bill(brand_id).await?;

        estimate_action(plan, metric, usage_of(&usage, metric), quantity, bill.total)
    }

    #[instrument(skip(self))]
    pub async fn project_costs(
        &self,
        brand_id: Uuid,
        days: u32,
    ) -> Result<CostProjection, AppError> {
        let brand = self.brand(brand_id).await?;
        let plan = self.catalog.plan(brand.tier());
        let now = Utc::now();

        let recent = self
            .usage
            .list_usage(
                brand_id,
                &ListUsageFilter::since(now - Duration::days(PROJECTION_WINDOW_DAYS)),
            )
            .await?;
        let bill = self.current_bill(brand_id).await?;

        project(
            plan,
            &recent,
            days,
            BillingPeriod::containing(now).days(),
            bill.total_overage_cost,
        )
    }

    #[instrument(skip(self))]
    pub async fn compare_plans(&self, brand_id: Uuid) -> Result<Vec<PlanComparison>, AppError> {
        self.brand(brand_id).await?;
        let usage = self.meter.current_usage(brand_id).await?;
        compare(self.catalog.all(), &usage)
    }

    pub fn tax_rate(&self, country: &str) -> Decimal {
        self.catalog.tax_rate(country)
    }
}
