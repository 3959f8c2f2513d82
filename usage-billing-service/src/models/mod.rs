//! Domain models for usage-billing-service.

mod billing;
mod brand;
mod metric;
mod plan;
mod pricing;
mod quota;
mod report;
mod usage;

pub use billing::{
    ActionEstimate, Bill, BillLine, BillingPeriodView, CostProjection, PlanComparison,
};
pub use brand::{Brand, UpsertBrand, DEFAULT_COUNTRY};
pub use metric::{Metric, UnknownMetric, UsageTotals};
pub use plan::{OveragePolicy, PlanLimits, PlanTier, Quota, QuotaPeriod};
pub use pricing::{
    BaseProduct, BulkPrice, CostBreakdown, DesignOptions, ImageComplexity, PriceQuote,
    PricingContext, PricingRules, Product, ProductRules, QuantityDiscount, ZoneRule,
    ZoneSelection, ZoneType,
};
pub use quota::{
    AlertSeverity, EstimatedCost, MetricUsage, QuotaAlert, QuotaCheck, SummaryPeriod,
    UsageSummary, UNLIMITED,
};
pub use report::{
    BrandInfo, CurrentPeriod, DailyData, DetailPeriod, DetailStats, ExecutiveSummary,
    MetricDetail, MonthlyReport, ReportPeriod, ReportStats, TopMetric,
};
pub use usage::{ListUsageFilter, UsageRecord, MAX_USAGE_VALUE};
