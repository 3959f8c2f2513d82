//! Configuration module for usage-billing-service.

use secrecy::Secret;
use service_core::config::{self as core_config, env_or};
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UsageBillingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Without a URL the usage cache is process-local.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Mirroring is disabled when no key is set.
    pub secret_key: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub usage_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            usage_ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub usage_queue_size: usize,
    pub provider_queue_size: usize,
    pub usage_write_max_elapsed_seconds: u64,
    pub provider_sync_max_elapsed_seconds: u64,
}

impl WorkerConfig {
    pub fn usage_write_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.usage_write_max_elapsed_seconds)
    }

    pub fn provider_sync_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.provider_sync_max_elapsed_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            usage_queue_size: 1024,
            provider_queue_size: 1024,
            usage_write_max_elapsed_seconds: 60,
            provider_sync_max_elapsed_seconds: 300,
        }
    }
}

impl UsageBillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let worker_defaults = WorkerConfig::default();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "usage-billing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            },
            provider: ProviderConfig {
                base_url: env::var("BILLING_PROVIDER_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
                secret_key: env::var("BILLING_PROVIDER_SECRET_KEY")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(Secret::new),
            },
            cache: CacheConfig {
                usage_ttl_seconds: env_or("USAGE_CACHE_TTL_SECONDS", 300),
            },
            workers: WorkerConfig {
                usage_queue_size: env_or("USAGE_QUEUE_SIZE", worker_defaults.usage_queue_size),
                provider_queue_size: env_or(
                    "PROVIDER_SYNC_QUEUE_SIZE",
                    worker_defaults.provider_queue_size,
                ),
                usage_write_max_elapsed_seconds: env_or(
                    "USAGE_WRITE_MAX_ELAPSED_SECONDS",
                    worker_defaults.usage_write_max_elapsed_seconds,
                ),
                provider_sync_max_elapsed_seconds: env_or(
                    "PROVIDER_SYNC_MAX_ELAPSED_SECONDS",
                    worker_defaults.provider_sync_max_elapsed_seconds,
                ),
            },
        })
    }
}
