//! Background persistence of queued usage records.

use crate::models::UsageRecord;
use crate::services::cache::{current_usage_key, UsageCache};
use crate::services::metrics::{record_error, record_usage_write};
use crate::services::store::UsageStore;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Producer side of the usage write queue.
#[derive(Clone)]
pub struct UsageQueue {
    tx: mpsc::Sender<UsageRecord>,
}

impl UsageQueue {
    /// Waits for queue capacity, so bursts are slowed down rather than dropped.
    pub async fn enqueue(&self, record: UsageRecord) -> Result<(), AppError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Usage queue closed")))
    }
}

pub struct UsageWriter {
    store: Arc<dyn UsageStore>,
    cache: Arc<dyn UsageCache>,
    rx: mpsc::Receiver<UsageRecord>,
    shutdown: CancellationToken,
    max_elapsed: Duration,
}

impl UsageWriter {
    pub fn new(
        store: Arc<dyn UsageStore>,
        cache: Arc<dyn UsageCache>,
        queue_size: usize,
        max_elapsed: Duration,
        shutdown: CancellationToken,
    ) -> (Self, UsageQueue) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let writer = Self {
            store,
            cache,
            rx,
            shutdown,
            max_elapsed,
        };
        (writer, UsageQueue { tx })
    }

    pub async fn run(mut self) {
        tracing::info!("Usage writer started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                record = self.rx.recv() => match record {
                    Some(record) => self.persist(record).await,
                    None => {
                        tracing::info!("Usage queue closed, writer exiting");
                        return;
                    }
                },
            }
        }

        // Records already accepted are part of the ledger; flush them.
        self.rx.close();
        let mut drained = 0usize;
        while let Some(record) = self.rx.recv().await {
            self.persist(record).await;
            drained += 1;
        }
        tracing::info!(drained = drained, "Usage writer stopped");
    }

    async fn persist(&self, record: UsageRecord) {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let result = retry(backoff, || async {
            match self.store.insert_usage(&record).await {
                Ok(()) => Ok(()),
                // A retried insert that already landed
                Err(AppError::Conflict(_)) => Ok(()),
                Err(e @ AppError::DatabaseError(_)) => Err(backoff::Error::transient(e)),
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await;

        match result {
            Ok(()) => {
                record_usage_write("persisted");
                if let Err(e) = self.cache.delete(&current_usage_key(record.brand_id)).await {
                    tracing::warn!(brand_id = %record.brand_id, error = %e, "Failed to invalidate usage cache");
                }
                tracing::debug!(
                    record_id = %record.record_id,
                    brand_id = %record.brand_id,
                    metric = %record.metric,
                    "Usage record persisted"
                );
            }
            Err(e) => {
                record_usage_write("failed");
                record_error(e.kind(), "persist_usage");
                tracing::error!(
                    record_id = %record.record_id,
                    brand_id = %record.brand_id,
                    metric = %record.metric,
                    value = %record.value,
                    error = %e,
                    "Failed to persist usage record"
                );
            }
        }
    }
}
