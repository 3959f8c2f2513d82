//! Best-effort mirroring of usage to the billing provider.

use crate::models::Metric;
use crate::services::metrics::record_provider_sync;
use crate::services::provider::{BillingProvider, ProviderError};
use crate::services::store::BrandStore;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub brand_id: Uuid,
    pub metric: Metric,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl MirrorJob {
    /// Providers take whole units; partial usage rounds up.
    pub fn quantity(&self) -> u64 {
        self.value.ceil().to_u64().unwrap_or(0)
    }
}

/// Producer side of the mirror queue.
#[derive(Clone)]
pub struct ProviderSyncQueue {
    tx: mpsc::Sender<MirrorJob>,
}

impl ProviderSyncQueue {
    /// Never blocks the caller. A full queue drops the job.
    pub fn enqueue(&self, job: MirrorJob) {
        if let Err(e) = self.tx.try_send(job) {
            record_provider_sync("dropped");
            tracing::warn!(error = %e, "Provider sync queue full, usage not mirrored");
        }
    }
}

pub struct ProviderSync {
    brands: Arc<dyn BrandStore>,
    provider: Arc<dyn BillingProvider>,
    rx: mpsc::Receiver<MirrorJob>,
    shutdown: CancellationToken,
    max_elapsed: Duration,
}

impl ProviderSync {
    pub fn new(
        brands: Arc<dyn BrandStore>,
        provider: Arc<dyn BillingProvider>,
        queue_size: usize,
        max_elapsed: Duration,
        shutdown: CancellationToken,
    ) -> (Self, ProviderSyncQueue) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let sync = Self {
            brands,
            provider,
            rx,
            shutdown,
            max_elapsed,
        };
        (sync, ProviderSyncQueue { tx })
    }

    pub async fn run(mut self) {
        tracing::info!(enabled = self.provider.is_enabled(), "Provider sync started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Provider sync shutting down");
                    break;
                }
                job = self.rx.recv() => match job {
                    Some(job) => self.mirror(job).await,
                    None => break,
                },
            }
        }
    }

    async fn mirror(&self, job: MirrorJob) {
        let brand = match self.brands.get_brand(job.brand_id).await {
            Ok(Some(brand)) => brand,
            Ok(None) => {
                record_provider_sync("skipped");
                tracing::warn!(brand_id = %job.brand_id, "Brand not found, usage not mirrored");
                return;
            }
            Err(e) => {
                record_provider_sync("failed");
                tracing::warn!(brand_id = %job.brand_id, error = %e, "Failed to load brand for mirroring");
                return;
            }
        };

        let Some(subscription_id) = brand.provider_subscription_id else {
            record_provider_sync("skipped");
            tracing::debug!(brand_id = %job.brand_id, "Brand has no provider subscription");
            return;
        };

        let quantity = job.quantity();
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let result = retry(backoff, || async {
            self.provider
                .report_usage(&subscription_id, job.metric, quantity, job.timestamp)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await;

        match result {
            Ok(_) => record_provider_sync("reported"),
            Err(e @ ProviderError::MissingItem { .. }) => {
                record_provider_sync("skipped");
                tracing::warn!(brand_id = %job.brand_id, error = %e, "Usage not mirrored");
            }
            Err(e) => {
                record_provider_sync("failed");
                tracing::warn!(
                    brand_id = %job.brand_id,
                    metric = %job.metric,
                    quantity = quantity,
                    error = %e,
                    "Failed to mirror usage to billing provider"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rounds_partial_units_up() {
        let job = MirrorJob {
            brand_id: Uuid::new_v4(),
            metric: Metric::StorageGb,
            value: Decimal::new(25, 1),
            timestamp: Utc::now(),
        };
        assert_eq!(job.quantity(), 3);

        let whole = MirrorJob {
            value: Decimal::from(4),
            ..job
        };
        assert_eq!(whole.quantity(), 4);
    }
}
