//! Services module for usage-billing-service.

pub mod amount;
pub mod billing;
pub mod cache;
pub mod catalog;
pub mod database;
pub mod memory;
pub mod metering;
pub mod metrics;
pub mod period;
pub mod pricing;
pub mod provider;
pub mod quotas;
pub mod reporting;
pub mod store;

pub use billing::BillingCalculator;
pub use cache::{InMemoryUsageCache, RedisUsageCache, UsageCache};
pub use catalog::PlanCatalog;
pub use database::Database;
pub use memory::InMemoryStore;
pub use metering::UsageMeter;
pub use metrics::{
    get_metrics, init_metrics, record_cache_lookup, record_error, record_provider_sync,
    record_quota_decision, record_usage_operation, record_usage_write,
};
pub use period::BillingPeriod;
pub use pricing::PricingEngine;
pub use provider::{BillingProvider, NoopProvider, ProviderError, StripeClient};
pub use quotas::{Consumption, QuotaService};
pub use reporting::UsageReporter;
pub use store::{BrandStore, ProductStore, UsageStore};
