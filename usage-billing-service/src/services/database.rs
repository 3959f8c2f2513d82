//! Database service for usage-billing-service.

use super::store::{BrandStore, ProductStore, UsageGuard, UsageStore};
use crate::models::{
    Brand, ListUsageFilter, Metric, Product, UpsertBrand, UsageRecord, UsageTotals,
};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Row shape of `usage_metrics`; the metric is stored as text.
#[derive(Debug, FromRow)]
struct UsageRow {
    record_id: Uuid,
    brand_id: Uuid,
    metric: String,
    value: Decimal,
    unit: String,
    timestamp: DateTime<Utc>,
    metadata: Option<serde_json::Value>,
}

impl UsageRow {
    fn into_record(self) -> Option<UsageRecord> {
        match self.metric.parse::<Metric>() {
            Ok(metric) => Some(UsageRecord {
                record_id: self.record_id,
                brand_id: self.brand_id,
                metric,
                value: self.value.normalize(),
                unit: self.unit,
                timestamp: self.timestamp,
                metadata: self.metadata,
            }),
            Err(e) => {
                warn!(record_id = %self.record_id, error = %e, "Skipping usage row");
                None
            }
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "usage-billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BrandStore for Database {
    #[instrument(skip(self))]
    async fn get_brand(&self, brand_id: Uuid) -> Result<Option<Brand>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_brand"])
            .start_timer();

        let brand = sqlx::query_as::<_, Brand>(
            r#"
            SELECT brand_id, name, plan, country, provider_subscription_id, created_utc, updated_utc
            FROM brands
            WHERE brand_id = $1
            "#,
        )
        .bind(brand_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get brand", e))?;

        timer.observe_duration();
        Ok(brand)
    }

    #[instrument(skip(self, input), fields(brand_id = %input.brand_id))]
    async fn upsert_brand(&self, input: &UpsertBrand) -> Result<Brand, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_brand"])
            .start_timer();

        let brand = sqlx::query_as::<_, Brand>(
            r#"
            INSERT INTO brands (brand_id, name, plan, country, provider_subscription_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (brand_id) DO UPDATE SET
                name = EXCLUDED.name,
                plan = COALESCE(EXCLUDED.plan, brands.plan),
                country = COALESCE(EXCLUDED.country, brands.country),
                provider_subscription_id = COALESCE(EXCLUDED.provider_subscription_id, brands.provider_subscription_id),
                updated_utc = NOW()
            RETURNING brand_id, name, plan, country, provider_subscription_id, created_utc, updated_utc
            "#,
        )
        .bind(input.brand_id)
        .bind(&input.name)
        .bind(input.plan.map(|p| p.as_str()))
        .bind(&input.country)
        .bind(&input.provider_subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert brand", e))?;

        timer.observe_duration();
        info!(brand_id = %brand.brand_id, plan = ?brand.plan, "Brand upserted");

        Ok(brand)
    }
}

#[async_trait]
impl UsageStore for Database {
    #[instrument(skip(self, record), fields(brand_id = %record.brand_id, metric = %record.metric))]
    async fn insert_usage(&self, record: &UsageRecord) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_usage"])
            .start_timer();

        let result = sqlx::query(
            r#"
            INSERT INTO usage_metrics (record_id, brand_id, metric, value, unit, timestamp, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (record_id) DO NOTHING
            "#,
        )
        .bind(record.record_id)
        .bind(record.brand_id)
        .bind(record.metric.as_str())
        .bind(record.value)
        .bind(&record.unit)
        .bind(record.timestamp)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert usage", e))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Usage record {} already exists",
                record.record_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, record, guard), fields(brand_id = %record.brand_id, metric = %record.metric))]
    async fn insert_usage_guarded(
        &self,
        record: &UsageRecord,
        since: DateTime<Utc>,
        guard: UsageGuard<'_>,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_usage_guarded"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // Serializes guarded writers of the same (brand, metric) until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", record.brand_id, record.metric))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to acquire usage lock", e))?;

        let used: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(value), 0)
            FROM usage_metrics
            WHERE brand_id = $1 AND metric = $2 AND timestamp >= $3
            "#,
        )
        .bind(record.brand_id)
        .bind(record.metric.as_str())
        .bind(since)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to sum usage", e))?;

        // Dropping the transaction on a rejected guard rolls it back.
        guard(used)?;

        sqlx::query(
            r#"
            INSERT INTO usage_metrics (record_id, brand_id, metric, value, unit, timestamp, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.record_id)
        .bind(record.brand_id)
        .bind(record.metric.as_str())
        .bind(record.value)
        .bind(&record.unit)
        .bind(record.timestamp)
        .bind(&record.metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert usage", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit usage", e))?;

        timer.observe_duration();
        Ok(used.normalize())
    }

    #[instrument(skip(self))]
    async fn sum_usage(
        &self,
        brand_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<UsageTotals, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_usage"])
            .start_timer();

        let rows = sqlx::query_as::<_, (String, Decimal)>(
            r#"
            SELECT metric, SUM(value)
            FROM usage_metrics
            WHERE brand_id = $1 AND timestamp >= $2
            GROUP BY metric
            "#,
        )
        .bind(brand_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum usage", e))?;

        timer.observe_duration();

        let mut totals = UsageTotals::new();
        for (metric, total) in rows {
            match metric.parse::<Metric>() {
                Ok(metric) => {
                    totals.insert(metric, total.normalize());
                }
                Err(e) => warn!(brand_id = %brand_id, error = %e, "Ignoring unknown metric"),
            }
        }
        Ok(totals)
    }

    #[instrument(skip(self, filter))]
    async fn list_usage(
        &self,
        brand_id: Uuid,
        filter: &ListUsageFilter,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_usage"])
            .start_timer();

        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT record_id, brand_id, metric, value, unit, timestamp, metadata
            FROM usage_metrics
            WHERE brand_id = $1
              AND ($2::text IS NULL OR metric = $2)
              AND timestamp >= $3
              AND ($4::timestamptz IS NULL OR timestamp < $4 OR ($5 AND timestamp = $4))
            ORDER BY timestamp ASC
            "#,
        )
        .bind(brand_id)
        .bind(filter.metric.map(|m| m.as_str()))
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.end_inclusive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list usage", e))?;

        timer.observe_duration();
        Ok(rows.into_iter().filter_map(UsageRow::into_record).collect())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl ProductStore for Database {
    #[instrument(skip(self))]
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, price_cents, base_cost_cents, labor_cost_cents, overhead_cost_cents, created_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get product", e))?;

        timer.observe_duration();
        Ok(product)
    }
}
