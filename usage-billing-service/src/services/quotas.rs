//! Quota checks, enforcement and usage summaries.

use crate::models::{
    AlertSeverity, Brand, EstimatedCost, Metric, MetricUsage, PlanLimits, PlanTier, Quota,
    QuotaAlert, QuotaCheck, SummaryPeriod, UsageRecord, UsageSummary, UsageTotals,
};
use crate::services::amount;
use crate::services::catalog::PlanCatalog;
use crate::services::metering::UsageMeter;
use crate::services::metrics::record_quota_decision;
use crate::services::period::BillingPeriod;
use crate::services::store::BrandStore;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Decides a request of `requested` units against a quota given `used` units.
pub fn evaluate_quota(
    quota: Option<&Quota>,
    used: Decimal,
    requested: Decimal,
) -> Result<QuotaCheck, AppError> {
    let Some(quota) = quota else {
        return Ok(QuotaCheck::unlimited());
    };

    let remaining = amount::excess(quota.limit, used)?;
    let overage = amount::excess(amount::add(used, requested)?, quota.limit)?;
    let over = overage > Decimal::ZERO;

    Ok(QuotaCheck {
        allowed: !(over && !quota.charges_overage()),
        remaining,
        limit: quota.limit,
        overage,
        will_charge: over && quota.charges_overage(),
        estimated_cost: if quota.charges_overage() {
            amount::mul(overage, quota.rate())?
        } else {
            Decimal::ZERO
        },
    })
}

/// User-facing message for a denied request.
pub fn quota_exceeded_message(metric: Metric, check: &QuotaCheck) -> String {
    format!(
        "Quota exceeded for {}. Limit: {}, Used: {}. Please upgrade your plan.",
        metric,
        check.limit,
        check.used()
    )
}

/// Builds the month-to-date summary of `usage` against `plan`.
pub fn summarize(
    brand_id: Uuid,
    plan: &PlanLimits,
    usage: &UsageTotals,
    period: BillingPeriod,
) -> Result<UsageSummary, AppError> {
    let hundred = Decimal::ONE_HUNDRED;
    let mut metrics = Vec::with_capacity(plan.quotas.len());
    let mut alerts = Vec::new();
    let mut overage_cost = Decimal::ZERO;

    for quota in &plan.quotas {
        let current = usage.get(&quota.metric).copied().unwrap_or(Decimal::ZERO);
        let percentage = if current >= quota.limit {
            hundred
        } else {
            current / quota.limit * hundred
        };
        let overage = amount::excess(current, quota.limit)?;
        overage_cost = amount::add(overage_cost, amount::mul(overage, quota.rate())?)?;

        let alert = if percentage >= Decimal::from(90) {
            Some((AlertSeverity::Critical, 90))
        } else if percentage >= Decimal::from(75) {
            Some((AlertSeverity::Warning, 75))
        } else {
            None
        };
        if let Some((severity, threshold)) = alert {
            alerts.push(QuotaAlert {
                severity,
                message: format!(
                    "{} at {}% of quota",
                    quota.metric,
                    amount::whole_percent(percentage)
                ),
                metric: quota.metric,
                threshold,
            });
        }

        metrics.push(MetricUsage {
            metric: quota.metric,
            current,
            limit: quota.limit,
            percentage: percentage
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            overage,
        });
    }

    let usage_cost = Decimal::ZERO;
    Ok(UsageSummary {
        brand_id,
        plan: plan.plan,
        period: SummaryPeriod {
            start: period.start,
            end: period.end,
            status: "active".to_string(),
        },
        metrics,
        estimated_cost: EstimatedCost {
            base: plan.base_price,
            usage: usage_cost,
            overage: overage_cost,
            total: amount::sum([plan.base_price, usage_cost, overage_cost])?,
        },
        alerts,
    })
}

fn decision_label(check: &QuotaCheck) -> &'static str {
    if !check.allowed {
        "denied"
    } else if check.will_charge {
        "charged"
    } else {
        "allowed"
    }
}

/// Result of an atomic check-and-record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Consumption {
    pub check: QuotaCheck,
    pub record: UsageRecord,
}

pub struct QuotaService {
    catalog: Arc<PlanCatalog>,
    brands: Arc<dyn BrandStore>,
    meter: Arc<UsageMeter>,
}

impl QuotaService {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        brands: Arc<dyn BrandStore>,
        meter: Arc<UsageMeter>,
    ) -> Self {
        Self {
            catalog,
            brands,
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
    pub async fn check_quota(
        &self,
        brand_id: Uuid,
        metric: Metric,
        amount: Decimal,
    ) -> Result<QuotaCheck, AppError> {
        let brand = self.brand(brand_id).await?;
        let plan = self.catalog.plan(brand.tier());

        let Some(quota) = plan.quota(metric) else {
            return Ok(QuotaCheck::unlimited());
        };

        let usage = self.meter.current_usage(brand_id).await?;
        let used = usage.get(&metric).copied().unwrap_or(Decimal::ZERO);
        let check = evaluate_quota(Some(quota), used, amount)?;

        record_quota_decision(metric.as_str(), decision_label(&check));
        Ok(check)
    }

    /// Like [`Self::check_quota`] but a denial is an error.
    #[instrument(skip(self))]
    pub async fn enforce_quota(
        &self,
        brand_id: Uuid,
        metric: Metric,
        amount: Decimal,
    ) -> Result<QuotaCheck, AppError> {
        let check = self.check_quota(brand_id, metric, amount).await?;

        if !check.allowed {
            return Err(AppError::QuotaExceeded(quota_exceeded_message(metric, &check)));
        }
        if check.will_charge {
            tracing::warn!(
                brand_id = %brand_id,
                metric = %metric,
                overage = %check.overage,
                estimated_cost = %check.estimated_cost,
                "Usage will incur overage charges"
            );
        }
        Ok(check)
    }

    /// Enforces the quota and records the usage as one step. Two concurrent
    /// calls can never both pass a limit that only one of them fits under.
    #[instrument(skip(self, metadata))]
    pub async fn consume(
        &self,
        brand_id: Uuid,
        metric: Metric,
        amount: Decimal,
        metadata: Option<serde_json::Value>,
    ) -> Result<Consumption, AppError> {
        let brand = self.brand(brand_id).await?;
        let quota = self.catalog.plan(brand.tier()).quota(metric).cloned();
        let record = UsageRecord::new(brand_id, metric, amount, metadata);

        let guard = |used: Decimal| -> Result<(), AppError> {
            let check = evaluate_quota(quota.as_ref(), used, amount)?;
            if check.allowed {
                Ok(())
            } else {
                Err(AppError::QuotaExceeded(quota_exceeded_message(metric, &check)))
            }
        };

        let used = match self.meter.record_usage_guarded(&record, &guard).await {
            Ok(used) => used,
            Err(e @ AppError::QuotaExceeded(_)) => {
                record_quota_decision(metric.as_str(), "denied");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let check = evaluate_quota(quota.as_ref(), used, amount)?;
        record_quota_decision(metric.as_str(), decision_label(&check));
        if check.will_charge {
            tracing::warn!(
                brand_id = %brand_id,
                metric = %metric,
                overage = %check.overage,
                "Usage recorded with overage charges"
            );
        }

        Ok(Consumption { check, record })
    }

    #[instrument(skip(self))]
    pub async fn usage_summary(&self, brand_id: Uuid) -> Result<UsageSummary, AppError> {
        let brand = self.brand(brand_id).await?;
        let plan = self.catalog.plan(brand.tier());
        let usage = self.meter.current_usage(brand_id).await?;
        summarize(
            brand_id,
            plan,
            &usage,
            BillingPeriod::containing(Utc::now()),
        )
    }

    pub fn plan_limits(&self, tier: PlanTier) -> &PlanLimits {
        self.catalog.plan(tier)
    }

    pub fn all_plans(&self) -> &[PlanLimits] {
        self.catalog.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn starter() -> PlanLimits {
        PlanCatalog::standard().plan(PlanTier::Starter).clone()
    }

    #[test]
    fn charge_quota_overage_is_allowed_and_priced() {
        let plan = starter();
        let check = evaluate_quota(
            plan.quota(Metric::Renders2d),
            Decimal::from(95),
            Decimal::from(10),
        )
        .unwrap();

        assert!(check.allowed);
        assert!(check.will_charge);
        assert_eq!(check.overage, Decimal::from(5));
        assert_eq!(check.remaining, Decimal::from(5));
        assert_eq!(check.estimated_cost, Decimal::from(100));
    }

    #[test]
    fn block_quota_denies_any_overage() {
        let plan = starter();
        let check = evaluate_quota(
            plan.quota(Metric::TeamMembers),
            Decimal::from(2),
            Decimal::ONE,
        )
        .unwrap();

        assert!(!check.allowed);
        assert!(!check.will_charge);
        assert_eq!(check.overage, Decimal::ONE);
        assert_eq!(check.remaining, Decimal::ZERO);
        assert_eq!(check.estimated_cost, Decimal::ZERO);
        assert_eq!(
            quota_exceeded_message(Metric::TeamMembers, &check),
            "Quota exceeded for team_members. Limit: 2, Used: 2. Please upgrade your plan."
        );
    }

    #[test]
    fn exactly_at_the_limit_is_not_overage() {
        let plan = starter();
        let check = evaluate_quota(
            plan.quota(Metric::TeamMembers),
            Decimal::ONE,
            Decimal::ONE,
        )
        .unwrap();
        assert!(check.allowed);
        assert_eq!(check.overage, Decimal::ZERO);
    }

    #[test]
    fn unmetered_metric_is_unlimited() {
        let check = evaluate_quota(None, Decimal::from(5_000), Decimal::from(10)).unwrap();
        assert!(check.allowed);
        assert_eq!(check.limit, Decimal::from(999_999));
        assert_eq!(check.remaining, Decimal::from(999_999));
        assert_eq!(check.estimated_cost, Decimal::ZERO);
    }

    #[test]
    fn overage_never_goes_negative() {
        let plan = starter();
        for used in [0, 10, 99, 100, 150] {
            let check = evaluate_quota(
                plan.quota(Metric::Renders2d),
                Decimal::from(used),
                Decimal::ONE,
            )
            .unwrap();
            assert_eq!(
                check.overage,
                (Decimal::from(used + 1) - Decimal::from(100)).max(Decimal::ZERO)
            );
            assert!(check.remaining >= Decimal::ZERO);
        }
    }

    #[test]
    fn summary_caps_percentages_and_raises_alerts() {
        let plan = starter();
        let mut usage = UsageTotals::new();
        usage.insert(Metric::Renders2d, Decimal::from(120));
        usage.insert(Metric::DesignsCreated, Decimal::from(40));
        usage.insert(Metric::Renders3d, Decimal::from(3));

        let period = BillingPeriod::containing(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        let summary = summarize(Uuid::nil(), &plan, &usage, period).unwrap();

        let renders = summary
            .metrics
            .iter()
            .find(|m| m.metric == Metric::Renders2d)
            .unwrap();
        assert_eq!(renders.percentage, Decimal::from(100));
        assert_eq!(renders.overage, Decimal::from(20));

        assert_eq!(summary.alerts.len(), 2);
        let designs_alert = &summary.alerts[0];
        assert_eq!(designs_alert.metric, Metric::DesignsCreated);
        assert_eq!(designs_alert.severity, AlertSeverity::Warning);
        assert_eq!(designs_alert.message, "designs_created at 80% of quota");

        let renders_alert = summary
            .alerts
            .iter()
            .find(|a| a.metric == Metric::Renders2d)
            .unwrap();
        assert_eq!(renders_alert.severity, AlertSeverity::Critical);
        assert_eq!(renders_alert.threshold, 90);

        // 20 renders over at 20 cents
        assert_eq!(summary.estimated_cost.overage, Decimal::from(400));
        assert_eq!(summary.estimated_cost.total, Decimal::from(3300));
        assert_eq!(summary.period.status, "active");
    }

    #[test]
    fn oversized_request_is_rejected_instead_of_overflowing() {
        let plan = starter();
        let result = evaluate_quota(plan.quota(Metric::Renders2d), Decimal::MAX, Decimal::MAX);
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let mut usage = UsageTotals::new();
        usage.insert(Metric::Renders2d, Decimal::MAX);
        let period = BillingPeriod::containing(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert!(matches!(
            summarize(Uuid::nil(), &plan, &usage, period),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn alert_thresholds_use_the_unrounded_percentage() {
        let plan = starter();
        let mut usage = UsageTotals::new();
        // 82.5% of 5 GB, 74.9995% of 10 renders
        usage.insert(Metric::StorageGb, Decimal::new(4125, 3));
        usage.insert(Metric::Renders3d, Decimal::new(749_995, 5));

        let period = BillingPeriod::containing(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        let summary = summarize(Uuid::nil(), &plan, &usage, period).unwrap();

        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.alerts[0].metric, Metric::StorageGb);
        assert_eq!(summary.alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(summary.alerts[0].message, "storage_gb at 83% of quota");

        let renders = summary
            .metrics
            .iter()
            .find(|m| m.metric == Metric::Renders3d)
            .unwrap();
        assert_eq!(renders.percentage, Decimal::from(75));
    }
}
