//! Application startup and lifecycle management.

use crate::config::{UsageBillingConfig, WorkerConfig};
use crate::handlers;
use crate::services::{
    BillingCalculator, BillingProvider, BrandStore, Database, InMemoryUsageCache, NoopProvider,
    PlanCatalog, PricingEngine, ProductStore, QuotaService, RedisUsageCache, StripeClient,
    UsageCache, UsageMeter, UsageReporter, UsageStore,
};
use crate::workers::{ProviderSync, UsageWriter};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub brands: Arc<dyn BrandStore>,
    pub usage_store: Arc<dyn UsageStore>,
    pub cache: Arc<dyn UsageCache>,
    pub meter: Arc<UsageMeter>,
    pub quotas: Arc<QuotaService>,
    pub billing: Arc<BillingCalculator>,
    pub pricing: Arc<PricingEngine>,
    pub reporter: Arc<UsageReporter>,
}

/// Storage and provider implementations the services run on.
pub struct Backends {
    pub brands: Arc<dyn BrandStore>,
    pub usage: Arc<dyn UsageStore>,
    pub products: Arc<dyn ProductStore>,
    pub cache: Arc<dyn UsageCache>,
    pub provider: Arc<dyn BillingProvider>,
}

/// Handles to the background workers.
pub struct WorkerSet {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// Stops the workers. Queued usage records are persisted before this returns.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
        tracing::info!("Background workers stopped");
    }
}

/// Wires services and spawns the background workers. Must run inside a tokio runtime.
pub fn assemble(
    backends: Backends,
    cache_ttl_seconds: u64,
    workers: &WorkerConfig,
) -> (AppState, WorkerSet) {
    let shutdown = CancellationToken::new();
    let catalog = Arc::new(PlanCatalog::standard());

    let (writer, usage_queue) = UsageWriter::new(
        backends.usage.clone(),
        backends.cache.clone(),
        workers.usage_queue_size,
        workers.usage_write_max_elapsed(),
        shutdown.clone(),
    );
    let (sync, sync_queue) = ProviderSync::new(
        backends.brands.clone(),
        backends.provider.clone(),
        workers.provider_queue_size,
        workers.provider_sync_max_elapsed(),
        shutdown.clone(),
    );

    let meter = Arc::new(UsageMeter::new(
        backends.brands.clone(),
        backends.usage.clone(),
        backends.cache.clone(),
        backends.provider,
        usage_queue,
        sync_queue,
        cache_ttl_seconds,
    ));
    let quotas = Arc::new(QuotaService::new(
        catalog.clone(),
        backends.brands.clone(),
        meter.clone(),
    ));
    let billing = Arc::new(BillingCalculator::new(
        catalog.clone(),
        backends.brands.clone(),
        backends.usage.clone(),
        meter.clone(),
    ));
    let reporter = Arc::new(UsageReporter::new(
        catalog,
        backends.brands.clone(),
        backends.usage.clone(),
        meter.clone(),
        billing.clone(),
    ));
    let pricing = Arc::new(PricingEngine::new(backends.products));

    let handles = vec![tokio::spawn(writer.run()), tokio::spawn(sync.run())];

    let state = AppState {
        brands: backends.brands,
        usage_store: backends.usage,
        cache: backends.cache,
        meter,
        quotas,
        billing,
        pricing,
        reporter,
    };

    (state, WorkerSet { shutdown, handles })
}

/// HTTP routes with the service-core middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/brands/:brand_id",
            put(handlers::brands::upsert_brand).get(handlers::brands::get_brand),
        )
        .route("/plans", get(handlers::plans::list_plans))
        .route("/plans/:plan", get(handlers::plans::get_plan))
        .route("/usage", post(handlers::usage::record_usage))
        .route("/usage/batch", post(handlers::usage::batch_record_usage))
        .route("/usage/consume", post(handlers::usage::consume_usage))
        .route("/usage/current", get(handlers::usage::current_usage))
        .route("/usage/provider", get(handlers::usage::provider_usage))
        .route("/quotas/summary", get(handlers::quotas::usage_summary))
        .route("/quotas/:metric/check", get(handlers::quotas::check_quota))
        .route("/quotas/:metric/enforce", post(handlers::quotas::enforce_quota))
        .route("/billing/current", get(handlers::billing::current_bill))
        .route("/billing/estimate", get(handlers::billing::estimate_action_cost))
        .route("/billing/projection", get(handlers::billing::project_costs))
        .route("/billing/compare", get(handlers::billing::compare_plans))
        .route("/billing/tax-rate/:country", get(handlers::billing::tax_rate))
        .route("/pricing/quote", post(handlers::pricing::quote_price))
        .route(
            "/pricing/products/:product_id/cost",
            post(handlers::pricing::cost_price),
        )
        .route("/reports/monthly", get(handlers::reports::monthly_report))
        .route("/reports/export", get(handlers::reports::export_csv))
        .route("/reports/summary", get(handlers::reports::executive_summary))
        .route("/reports/metrics/:metric", get(handlers::reports::metric_detail))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    workers: WorkerSet,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: UsageBillingConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;
        let db = Arc::new(db);

        let cache: Arc<dyn UsageCache> = match &config.redis.url {
            Some(url) => Arc::new(RedisUsageCache::new(url).await?),
            None => {
                tracing::warn!("REDIS_URL not set, using a process-local usage cache");
                Arc::new(InMemoryUsageCache::new())
            }
        };

        let provider: Arc<dyn BillingProvider> = match &config.provider.secret_key {
            Some(key) => Arc::new(
                StripeClient::new(&config.provider.base_url, key.clone())
                    .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?,
            ),
            None => {
                tracing::warn!("Billing provider key not set, usage will not be mirrored");
                Arc::new(NoopProvider)
            }
        };

        let backends = Backends {
            brands: db.clone(),
            usage: db.clone(),
            products: db,
            cache,
            provider,
        };
        let (state, workers) =
            assemble(backends, config.cache.usage_ttl_seconds, &config.workers);

        let addr = config.common.listen_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Usage billing service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            workers,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serves until `shutdown` resolves, then drains the background workers.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            service = "usage-billing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await;

        self.workers.shutdown().await;

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
