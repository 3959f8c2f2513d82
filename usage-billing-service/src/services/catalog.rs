//! Immutable plan and tax tables, built once at startup.

use crate::models::{Metric, OveragePolicy, PlanLimits, PlanTier, Quota, QuotaPeriod};
use rust_decimal::Decimal;

/// Plan tiers and country tax rates.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: [PlanLimits; 4],
    tax_rates: Vec<(&'static str, Decimal)>,
    default_tax_rate: Decimal,
}

fn charge(metric: Metric, limit: i64, rate: i64) -> Quota {
    Quota {
        metric,
        limit: Decimal::from(limit),
        period: QuotaPeriod::Month,
        overage: OveragePolicy::Charge,
        overage_rate: Some(Decimal::from(rate)),
    }
}

fn block(metric: Metric, limit: i64) -> Quota {
    Quota {
        metric,
        limit: Decimal::from(limit),
        period: QuotaPeriod::Month,
        overage: OveragePolicy::Block,
        overage_rate: None,
    }
}

fn features(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl PlanCatalog {
    /// The standard commercial tiers. Limits and rates are part of the billing contract.
    pub fn standard() -> Self {
        use Metric::*;

        let plans = [
            PlanLimits {
                plan: PlanTier::Starter,
                base_price: Decimal::from(2900),
                quotas: vec![
                    charge(DesignsCreated, 50, 50),
                    charge(Renders2d, 100, 20),
                    charge(Renders3d, 10, 100),
                    charge(AiGenerations, 20, 75),
                    charge(StorageGb, 5, 50),
                    charge(ApiCalls, 10_000, 1),
                    block(TeamMembers, 2),
                ],
                features: features(&["Basic support", "Email notifications", "2 team members"]),
            },
            PlanLimits {
                plan: PlanTier::Professional,
                base_price: Decimal::from(9900),
                quotas: vec![
                    charge(DesignsCreated, 200, 40),
                    charge(Renders2d, 500, 15),
                    charge(Renders3d, 50, 80),
                    charge(AiGenerations, 100, 60),
                    charge(StorageGb, 25, 40),
                    charge(ApiCalls, 50_000, 1),
                    block(TeamMembers, 10),
                ],
                features: features(&[
                    "Priority support",
                    "Advanced analytics",
                    "10 team members",
                    "Custom branding",
                ]),
            },
            PlanLimits {
                plan: PlanTier::Business,
                base_price: Decimal::from(29900),
                quotas: vec![
                    charge(DesignsCreated, 1000, 30),
                    charge(Renders2d, 2000, 10),
                    charge(Renders3d, 200, 60),
                    charge(AiGenerations, 500, 50),
                    charge(StorageGb, 100, 30),
                    charge(ApiCalls, 200_000, 1),
                    block(TeamMembers, 50),
                ],
                features: features(&[
                    "Dedicated support",
                    "Advanced analytics",
                    "50 team members",
                    "Custom branding",
                    "API access",
                    "Webhooks",
                ]),
            },
            PlanLimits {
                plan: PlanTier::Enterprise,
                base_price: Decimal::from(99900),
                quotas: vec![
                    charge(DesignsCreated, 99_999, 20),
                    charge(Renders2d, 99_999, 5),
                    charge(Renders3d, 99_999, 40),
                    charge(AiGenerations, 99_999, 40),
                    charge(StorageGb, 500, 20),
                    charge(ApiCalls, 9_999_999, 1),
                    block(TeamMembers, 999),
                ],
                features: features(&[
                    "White glove support",
                    "Custom analytics",
                    "Unlimited team members",
                    "Full customization",
                    "API access",
                    "Webhooks",
                    "SLA 99.9%",
                    "Dedicated infrastructure",
                ]),
            },
        ];

        Self {
            plans,
            tax_rates: vec![
                ("FR", Decimal::new(20, 2)),
                ("BE", Decimal::new(21, 2)),
                ("DE", Decimal::new(19, 2)),
                ("ES", Decimal::new(21, 2)),
                ("IT", Decimal::new(22, 2)),
                ("UK", Decimal::new(20, 2)),
                ("US", Decimal::ZERO),
            ],
            default_tax_rate: Decimal::new(20, 2),
        }
    }

    pub fn plan(&self, tier: PlanTier) -> &PlanLimits {
        &self.plans[tier.index()]
    }

    pub fn all(&self) -> &[PlanLimits] {
        &self.plans
    }

    /// Flat tax rate for an ISO country code. Unknown countries pay the default rate.
    pub fn tax_rate(&self, country: &str) -> Decimal {
        let country = country.trim().to_ascii_uppercase();
        self.tax_rates
            .iter()
            .find(|(code, _)| *code == country)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.default_tax_rate)
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
