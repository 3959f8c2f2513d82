//! Test helper module for usage-billing-service integration tests.
//!
//! Runs the full router on in-memory stores; no PostgreSQL or Redis needed.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use usage_billing_service::config::WorkerConfig;
use usage_billing_service::models::{PlanTier, UpsertBrand};
use usage_billing_service::services::{
    init_metrics, BillingProvider, BrandStore, InMemoryStore, InMemoryUsageCache, NoopProvider,
};
use usage_billing_service::startup::{assemble, router, Backends, WorkerSet};
use uuid::Uuid;

pub const BRAND_HEADER: &str = "X-Brand-ID";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryUsageCache>,
    workers: WorkerSet,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_provider(Arc::new(NoopProvider)).await
    }

    pub async fn spawn_with_provider(provider: Arc<dyn BillingProvider>) -> Self {
        init_metrics();

        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryUsageCache::new());
        let backends = Backends {
            brands: store.clone(),
            usage: store.clone(),
            products: store.clone(),
            cache: cache.clone(),
            provider,
        };
        let workers_config = WorkerConfig {
            usage_queue_size: 64,
            provider_queue_size: 64,
            usage_write_max_elapsed_seconds: 5,
            provider_sync_max_elapsed_seconds: 5,
        };

        let (state, workers) = assemble(backends, 300, &workers_config);

        Self {
            router: router(state),
            store,
            cache,
            workers,
        }
    }

    /// Creates a brand on `plan` billed in `country`.
    pub async fn seed_brand(&self, plan: PlanTier, country: &str) -> Uuid {
        self.seed_brand_with_subscription(plan, country, None).await
    }

    pub async fn seed_brand_with_subscription(
        &self,
        plan: PlanTier,
        country: &str,
        subscription_id: Option<&str>,
    ) -> Uuid {
        let brand_id = Uuid::new_v4();
        self.store
            .upsert_brand(&UpsertBrand {
                brand_id,
                name: format!("Brand {}", &brand_id.to_string()[..8]),
                plan: Some(plan),
                country: Some(country.to_string()),
                provider_subscription_id: subscription_id.map(str::to_string),
            })
            .await
            .expect("Failed to seed brand");
        brand_id
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        brand: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(brand_id) = brand {
            builder = builder.header(BRAND_HEADER, brand_id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        (status, bytes.to_vec())
    }

    pub async fn get(&self, uri: &str, brand: Option<Uuid>) -> (StatusCode, Value) {
        let (status, body) = self.send(Method::GET, uri, brand, None).await;
        (status, parse(&body))
    }

    pub async fn post(&self, uri: &str, brand: Option<Uuid>, body: Value) -> (StatusCode, Value) {
        let (status, body) = self.send(Method::POST, uri, brand, Some(body)).await;
        (status, parse(&body))
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, body) = self.send(Method::PUT, uri, None, Some(body)).await;
        (status, parse(&body))
    }

    /// Waits for the usage writer to persist `count` records in total.
    pub async fn wait_for_records(&self, count: usize) {
        for _ in 0..200 {
            if self.store.usage_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "Timed out waiting for {} usage records, have {}",
            count,
            self.store.usage_count()
        );
    }

    pub async fn shutdown(self) {
        self.workers.shutdown().await;
    }
}

fn parse(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into()))
}

/// Reads a decimal that was serialized as a JSON string.
pub fn dec(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("Expected decimal string, got {}", value))
        .parse()
        .expect("Invalid decimal")
}
