//! Persistence seams. PostgreSQL implements them in production and
//! [`super::memory::InMemoryStore`] in tests and local runs.

use crate::models::{Brand, ListUsageFilter, Product, UpsertBrand, UsageRecord, UsageTotals};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

/// Decides whether a write may proceed given the usage already recorded for the
/// same brand and metric in the current window.
pub type UsageGuard<'a> = &'a (dyn Fn(Decimal) -> Result<(), AppError> + Send + Sync);

#[async_trait]
pub trait BrandStore: Send + Sync {
    async fn get_brand(&self, brand_id: Uuid) -> Result<Option<Brand>, AppError>;
    async fn upsert_brand(&self, input: &UpsertBrand) -> Result<Brand, AppError>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn insert_usage(&self, record: &UsageRecord) -> Result<(), AppError>;

    /// Sums the record's (brand, metric) usage since `since`, runs `guard` on that
    /// sum and inserts the record only if the guard passes. Concurrent guarded
    /// inserts for the same (brand, metric) are serialized. Returns the sum seen
    /// by the guard.
    async fn insert_usage_guarded(
        &self,
        record: &UsageRecord,
        since: DateTime<Utc>,
        guard: UsageGuard<'_>,
    ) -> Result<Decimal, AppError>;

    async fn sum_usage(&self, brand_id: Uuid, since: DateTime<Utc>)
        -> Result<UsageTotals, AppError>;

    /// Records in the filter's range, oldest first.
    async fn list_usage(
        &self,
        brand_id: Uuid,
        filter: &ListUsageFilter,
    ) -> Result<Vec<UsageRecord>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError>;
}
