//! Metered usage dimensions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A billable usage dimension. Closed set; anything else is rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DesignsCreated,
    #[serde(rename = "renders_2d")]
    Renders2d,
    #[serde(rename = "renders_3d")]
    Renders3d,
    ExportsGltf,
    ExportsUsdz,
    AiGenerations,
    StorageGb,
    BandwidthGb,
    ApiCalls,
    WebhookDeliveries,
    CustomDomains,
    TeamMembers,
}

/// Per-metric usage totals for a window.
pub type UsageTotals = BTreeMap<Metric, Decimal>;

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::DesignsCreated,
        Metric::Renders2d,
        Metric::Renders3d,
        Metric::ExportsGltf,
        Metric::ExportsUsdz,
        Metric::AiGenerations,
        Metric::StorageGb,
        Metric::BandwidthGb,
        Metric::ApiCalls,
        Metric::WebhookDeliveries,
        Metric::CustomDomains,
        Metric::TeamMembers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::DesignsCreated => "designs_created",
            Metric::Renders2d => "renders_2d",
            Metric::Renders3d => "renders_3d",
            Metric::ExportsGltf => "exports_gltf",
            Metric::ExportsUsdz => "exports_usdz",
            Metric::AiGenerations => "ai_generations",
            Metric::StorageGb => "storage_gb",
            Metric::BandwidthGb => "bandwidth_gb",
            Metric::ApiCalls => "api_calls",
            Metric::WebhookDeliveries => "webhook_deliveries",
            Metric::CustomDomains => "custom_domains",
            Metric::TeamMembers => "team_members",
        }
    }

    /// Unit label stored with each usage record.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::DesignsCreated => "designs",
            Metric::Renders2d | Metric::Renders3d => "renders",
            Metric::ExportsGltf | Metric::ExportsUsdz => "exports",
            Metric::AiGenerations => "generations",
            Metric::StorageGb | Metric::BandwidthGb => "GB",
            Metric::ApiCalls => "calls",
            Metric::WebhookDeliveries => "webhooks",
            Metric::CustomDomains => "domains",
            Metric::TeamMembers => "members",
        }
    }

    /// Product identifier of the billing provider line item that mirrors this metric.
    pub fn provider_product(&self) -> &'static str {
        match self {
            Metric::DesignsCreated => "prod_designs",
            Metric::Renders2d => "prod_renders_2d",
            Metric::Renders3d => "prod_renders_3d",
            Metric::ExportsGltf | Metric::ExportsUsdz => "prod_exports",
            Metric::AiGenerations => "prod_ai",
            Metric::StorageGb => "prod_storage",
            Metric::BandwidthGb => "prod_bandwidth",
            Metric::ApiCalls => "prod_api",
            Metric::WebhookDeliveries => "prod_webhooks",
            Metric::CustomDomains => "prod_domains",
            Metric::TeamMembers => "prod_team",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown metric: {0}")]
pub struct UnknownMetric(pub String);
