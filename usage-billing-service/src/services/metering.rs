//! Usage metering: records usage, serves current-month aggregates and
//! provider-side usage.

use crate::models::{Metric, UsageRecord, UsageTotals, MAX_USAGE_VALUE};
use crate::services::cache::{current_usage_key, UsageCache};
use crate::services::metrics::{record_cache_lookup, record_usage_operation};
use crate::services::period::BillingPeriod;
use crate::services::provider::BillingProvider;
use crate::services::store::{BrandStore, UsageGuard, UsageStore};
use crate::workers::{MirrorJob, ProviderSyncQueue, UsageQueue};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub struct UsageMeter {
    brands: Arc<dyn BrandStore>,
    usage: Arc<dyn UsageStore>,
    cache: Arc<dyn UsageCache>,
    provider: Arc<dyn BillingProvider>,
    writes: UsageQueue,
    mirror: ProviderSyncQueue,
    cache_ttl_seconds: u64,
}

impl UsageMeter {
    pub fn new(
        brands: Arc<dyn BrandStore>,
        usage: Arc<dyn UsageStore>,
        cache: Arc<dyn UsageCache>,
        provider: Arc<dyn BillingProvider>,
        writes: UsageQueue,
        mirror: ProviderSyncQueue,
        cache_ttl_seconds: u64,
    ) -> Self {
        Self {
            brands,
            usage,
            cache,
            provider,
            writes,
            mirror,
            cache_ttl_seconds,
        }
    }

    fn validate_value(value: Decimal) -> Result<(), AppError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Usage value must be non-negative, got {}",
                value
            )));
        }
        if value >= MAX_USAGE_VALUE {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Usage value must be less than {}, got {}",
                MAX_USAGE_VALUE,
                value
            )));
        }
        Ok(())
    }

    async fn require_brand(&self, brand_id: Uuid) -> Result<(), AppError> {
        match self.brands.get_brand(brand_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(anyhow::anyhow!("Brand not found"))),
        }
    }

    /// Accepts a usage event for asynchronous persistence and provider mirroring.
    #[instrument(skip(self, metadata))]
    pub async fn record_usage(
        &self,
        brand_id: Uuid,
        metric: Metric,
        value: Decimal,
        metadata: Option<serde_json::Value>,
    ) -> Result<UsageRecord, AppError> {
        Self::validate_value(value)?;
        self.require_brand(brand_id).await?;

        let record = UsageRecord::new(brand_id, metric, value, metadata);
        self.writes.enqueue(record.clone()).await?;
        self.after_write(&record, "queued").await;

        tracing::info!(
            record_id = %record.record_id,
            brand_id = %brand_id,
            metric = %metric,
            value = %value,
            "Usage recorded"
        );
        Ok(record)
    }

    /// Records several events for one brand; fails on the first invalid one.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn batch_record_usage(
        &self,
        brand_id: Uuid,
        items: Vec<(Metric, Decimal)>,
    ) -> Result<Vec<UsageRecord>, AppError> {
        for (_, value) in &items {
            Self::validate_value(*value)?;
        }
        futures::future::try_join_all(
            items
                .into_iter()
                .map(|(metric, value)| self.record_usage(brand_id, metric, value, None)),
        )
        .await
    }

    /// Writes a record synchronously once `guard` accepts the usage already
    /// recorded this month. Returns that prior usage.
    pub async fn record_usage_guarded(
        &self,
        record: &UsageRecord,
        guard: UsageGuard<'_>,
    ) -> Result<Decimal, AppError> {
        Self::validate_value(record.value)?;
        let since = BillingPeriod::containing(record.timestamp).start;
        let used = self.usage.insert_usage_guarded(record, since, guard).await?;
        self.after_write(record, "guarded").await;
        Ok(used)
    }

    async fn after_write(&self, record: &UsageRecord, path: &str) {
        if self.provider.is_enabled() {
            self.mirror.enqueue(MirrorJob {
                brand_id: record.brand_id,
                metric: record.metric,
                value: record.value,
                timestamp: record.timestamp,
            });
        }

        if let Err(e) = self.cache.delete(&current_usage_key(record.brand_id)).await {
            tracing::warn!(brand_id = %record.brand_id, error = %e, "Failed to invalidate usage cache");
        }

        record_usage_operation(record.metric.as_str(), path);
    }

    /// Per-metric usage since the start of the current UTC month.
    #[instrument(skip(self))]
    pub async fn current_usage(&self, brand_id: Uuid) -> Result<UsageTotals, AppError> {
        let key = current_usage_key(brand_id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<UsageTotals>(&cached) {
                Ok(totals) => {
                    record_cache_lookup("hit");
                    return Ok(totals);
                }
                Err(e) => tracing::warn!(error = %e, "Discarding unreadable cached usage"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(brand_id = %brand_id, error = %e, "Usage cache read failed"),
        }
        record_cache_lookup("miss");

        let period = BillingPeriod::containing(Utc::now());
        let totals = self.usage.sum_usage(brand_id, period.start).await?;

        match serde_json::to_string(&totals) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, &json, self.cache_ttl_seconds).await {
                    tracing::warn!(brand_id = %brand_id, error = %e, "Usage cache write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize usage totals"),
        }

        Ok(totals)
    }

    /// Usage as the billing provider sees it. Zero whenever it cannot be determined.
    #[instrument(skip(self))]
    pub async fn provider_usage(
        &self,
        brand_id: Uuid,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, AppError> {
        let brand = self
            .brands
            .get_brand(brand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Brand not found")))?;

        let Some(subscription_id) = brand.provider_subscription_id else {
            return Ok(Decimal::ZERO);
        };

        match self
            .provider
            .usage_total(&subscription_id, metric, start, end)
            .await
        {
            Ok(total) => Ok(total),
            Err(e) => {
                tracing::warn!(brand_id = %brand_id, metric = %metric, error = %e, "Failed to read provider usage");
                Ok(Decimal::ZERO)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_outside_the_accepted_range_are_rejected() {
        assert!(UsageMeter::validate_value(Decimal::ZERO).is_ok());
        assert!(UsageMeter::validate_value(MAX_USAGE_VALUE - Decimal::new(1, 6)).is_ok());
        assert!(matches!(
            UsageMeter::validate_value(Decimal::NEGATIVE_ONE),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            UsageMeter::validate_value(MAX_USAGE_VALUE),
            Err(AppError::BadRequest(_))
        ));
    }
}
