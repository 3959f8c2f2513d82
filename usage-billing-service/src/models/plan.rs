//! Subscription tiers and their quota definitions.

use super::Metric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Subscription tier of a brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Professional,
    Business,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Starter,
        PlanTier::Professional,
        PlanTier::Business,
        PlanTier::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::Business => "business",
            PlanTier::Enterprise => "enterprise",
        }
    }

    /// Unknown or missing tiers fall back to starter.
    pub fn from_string(s: &str) -> Self {
        match s {
            "professional" => PlanTier::Professional,
            "business" => PlanTier::Business,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Starter,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            PlanTier::Starter => 0,
            PlanTier::Professional => 1,
            PlanTier::Business => 2,
            PlanTier::Enterprise => 3,
        }
    }
}

/// What happens once a quota's limit is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OveragePolicy {
    Block,
    Charge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    Month,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub metric: Metric,
    pub limit: Decimal,
    pub period: QuotaPeriod,
    pub overage: OveragePolicy,
    /// Cents per unit beyond the limit. Only meaningful for `Charge`.
    pub overage_rate: Option<Decimal>,
}

impl Quota {
    pub fn charges_overage(&self) -> bool {
        self.overage == OveragePolicy::Charge
    }

    pub fn rate(&self) -> Decimal {
        self.overage_rate.unwrap_or(Decimal::ZERO)
    }
}

/// Everything a tier includes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub plan: PlanTier,
    /// Monthly base price in cents.
    pub base_price: Decimal,
    pub quotas: Vec<Quota>,
    pub features: Vec<String>,
}

impl PlanLimits {
    pub fn quota(&self, metric: Metric) -> Option<&Quota> {
        self.quotas.iter().find(|q| q.metric == metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_falls_back_to_starter() {
        assert_eq!(PlanTier::from_string("platinum"), PlanTier::Starter);
        assert_eq!(PlanTier::from_string(""), PlanTier::Starter);
        for tier in PlanTier::ALL {
            assert_eq!(PlanTier::from_string(tier.as_str()), tier);
        }
    }

    #[test]
    fn block_quota_has_zero_rate() {
        let quota = Quota {
            metric: Metric::TeamMembers,
            limit: Decimal::from(3),
            period: QuotaPeriod::Month,
            overage: OveragePolicy::Block,
            overage_rate: None,
        };
        assert!(!quota.charges_overage());
        assert_eq!(quota.rate(), Decimal::ZERO);
    }
}
