//! In-memory stores for tests and local runs without PostgreSQL.

use super::store::{BrandStore, ProductStore, UsageGuard, UsageStore};
use crate::models::{
    Brand, ListUsageFilter, Product, UpsertBrand, UsageRecord, UsageTotals,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    brands: Mutex<HashMap<Uuid, Brand>>,
    usage: Mutex<Vec<UsageRecord>>,
    products: Mutex<HashMap<Uuid, Product>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: Product) {
        lock(&self.products).insert(product.product_id, product);
    }

    /// Number of persisted usage records, across brands.
    pub fn usage_count(&self) -> usize {
        lock(&self.usage).len()
    }
}

#[async_trait]
impl BrandStore for InMemoryStore {
    async fn get_brand(&self, brand_id: Uuid) -> Result<Option<Brand>, AppError> {
        Ok(lock(&self.brands).get(&brand_id).cloned())
    }

    async fn upsert_brand(&self, input: &UpsertBrand) -> Result<Brand, AppError> {
        let now = Utc::now();
        let mut brands = lock(&self.brands);
        let brand = brands
            .entry(input.brand_id)
            .and_modify(|b| {
                b.name = input.name.clone();
                if let Some(plan) = input.plan {
                    b.plan = Some(plan.as_str().to_string());
                }
                if input.country.is_some() {
                    b.country = input.country.clone();
                }
                if input.provider_subscription_id.is_some() {
                    b.provider_subscription_id = input.provider_subscription_id.clone();
                }
                b.updated_utc = now;
            })
            .or_insert_with(|| Brand {
                brand_id: input.brand_id,
                name: input.name.clone(),
                plan: input.plan.map(|p| p.as_str().to_string()),
                country: input.country.clone(),
                provider_subscription_id: input.provider_subscription_id.clone(),
                created_utc: now,
                updated_utc: now,
            });
        Ok(brand.clone())
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn insert_usage(&self, record: &UsageRecord) -> Result<(), AppError> {
        let mut usage = lock(&self.usage);
        if usage.iter().any(|r| r.record_id == record.record_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Usage record {} already exists",
                record.record_id
            )));
        }
        usage.push(record.clone());
        Ok(())
    }

    async fn insert_usage_guarded(
        &self,
        record: &UsageRecord,
        since: DateTime<Utc>,
        guard: UsageGuard<'_>,
    ) -> Result<Decimal, AppError> {
        // The lock spans the sum, the guard and the push.
        let mut usage = lock(&self.usage);
        let used: Decimal = usage
            .iter()
            .filter(|r| {
                r.brand_id == record.brand_id && r.metric == record.metric && r.timestamp >= since
            })
            .map(|r| r.value)
            .sum();
        guard(used)?;
        usage.push(record.clone());
        Ok(used)
    }

    async fn sum_usage(
        &self,
        brand_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<UsageTotals, AppError> {
        let mut totals = UsageTotals::new();
        for record in lock(&self.usage)
            .iter()
            .filter(|r| r.brand_id == brand_id && r.timestamp >= since)
        {
            *totals.entry(record.metric).or_insert(Decimal::ZERO) += record.value;
        }
        Ok(totals)
    }

    async fn list_usage(
        &self,
        brand_id: Uuid,
        filter: &ListUsageFilter,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let mut records: Vec<UsageRecord> = lock(&self.usage)
            .iter()
            .filter(|r| r.brand_id == brand_id && filter.matches(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(lock(&self.products).get(&product_id).cloned())
    }
}
