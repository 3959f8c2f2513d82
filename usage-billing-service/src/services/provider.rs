//! Billing provider client.
//!
//! Mirrors usage quantities to a Stripe-compatible usage-record API. The local
//! ledger stays authoritative; nothing here is on the request path of
//! `record_usage`.

use crate::models::Metric;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::inject_trace_context;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Worth retrying: network failures, 429 and 5xx.
    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Provider rejected request: {0}")]
    Permanent(String),

    #[error("Subscription {subscription_id} has no item for {metric}")]
    MissingItem {
        subscription_id: String,
        metric: Metric,
    },

    #[error("Billing provider not configured")]
    NotConfigured,
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Adds `quantity` to the subscription item billed for `metric`.
    /// Returns the provider's usage record id.
    async fn report_usage(
        &self,
        subscription_id: &str,
        metric: Metric,
        quantity: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<String, ProviderError>;

    /// Total usage the provider has for `metric` in summaries whose period
    /// starts inside `[start, end]`.
    async fn usage_total(
        &self,
        subscription_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct Subscription {
    id: String,
    items: ListResponse<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    id: String,
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    product: Option<ProductRef>,
}

/// Stripe returns either the product id or the expanded product object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProductRef {
    Id(String),
    Expanded { id: String },
}

impl ProductRef {
    fn id(&self) -> &str {
        match self {
            ProductRef::Id(id) => id,
            ProductRef::Expanded { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsageRecordResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UsageRecordSummary {
    total_usage: i64,
    period: SummaryPeriod,
}

#[derive(Debug, Deserialize)]
struct SummaryPeriod {
    start: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Stripe usage-record client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: Secret<String>,
}

impl StripeClient {
    pub fn new(base_url: &str, secret_key: Secret<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        headers
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<Subscription, ProviderError> {
        let url = format!("{}/v1/subscriptions/{}", self.base_url, subscription_id);

        let response = self
            .client
            .get(&url)
            .headers(Self::headers())
            .bearer_auth(self.secret_key.expose_secret())
            .query(&[("expand[]", "items.data.price.product")])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        parse_response(response).await
    }

    async fn find_item(
        &self,
        subscription_id: &str,
        metric: Metric,
    ) -> Result<String, ProviderError> {
        let subscription = self.fetch_subscription(subscription_id).await?;
        let product = metric.provider_product();

        subscription
            .items
            .data
            .into_iter()
            .find(|item| {
                item.price
                    .as_ref()
                    .and_then(|p| p.product.as_ref())
                    .is_some_and(|p| p.id() == product)
            })
            .map(|item| item.id)
            .ok_or_else(|| ProviderError::MissingItem {
                subscription_id: subscription.id,
                metric,
            })
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Transient(e.to_string()))?;

    tracing::debug!(status = %status, "Billing provider response");

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| ProviderError::Permanent(format!("Unexpected response: {}", e)));
    }

    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .map(|e| {
            format!(
                "{} - {}",
                e.error.kind.unwrap_or_else(|| "unknown".to_string()),
                e.error.message.unwrap_or_default()
            )
        })
        .unwrap_or(body);
    let message = format!("{}: {}", status, detail);

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(ProviderError::Transient(message))
    } else {
        Err(ProviderError::Permanent(message))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    fn is_enabled(&self) -> bool {
        !self.secret_key.expose_secret().is_empty()
    }

    #[tracing::instrument(skip(self, timestamp))]
    async fn report_usage(
        &self,
        subscription_id: &str,
        metric: Metric,
        quantity: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<String, ProviderError> {
        let item_id = self.find_item(subscription_id, metric).await?;
        let url = format!(
            "{}/v1/subscription_items/{}/usage_records",
            self.base_url, item_id
        );

        let response = self
            .client
            .post(&url)
            .headers(Self::headers())
            .bearer_auth(self.secret_key.expose_secret())
            .form(&[
                ("quantity", quantity.to_string()),
                ("timestamp", timestamp.timestamp().to_string()),
                ("action", "increment".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let record: UsageRecordResponse = parse_response(response).await?;
        tracing::info!(
            usage_record_id = %record.id,
            subscription_item = %item_id,
            quantity = quantity,
            "Usage mirrored to billing provider"
        );
        Ok(record.id)
    }

    #[tracing::instrument(skip(self))]
    async fn usage_total(
        &self,
        subscription_id: &str,
        metric: Metric,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let item_id = self.find_item(subscription_id, metric).await?;
        let url = format!(
            "{}/v1/subscription_items/{}/usage_record_summaries",
            self.base_url, item_id
        );

        let response = self
            .client
            .get(&url)
            .headers(Self::headers())
            .bearer_auth(self.secret_key.expose_secret())
            .query(&[("limit", "100")])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let summaries: ListResponse<UsageRecordSummary> = parse_response(response).await?;
        let (start, end) = (start.timestamp(), end.timestamp());

        Ok(summaries
            .data
            .iter()
            .filter(|s| s.period.start.is_some_and(|t| t >= start && t <= end))
            .map(|s| Decimal::from(s.total_usage))
            .sum())
    }
}

/// Used when no provider credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct NoopProvider;

#[async_trait]
impl BillingProvider for NoopProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn report_usage(
        &self,
        _subscription_id: &str,
        _metric: Metric,
        _quantity: u64,
        _timestamp: DateTime<Utc>,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn usage_total(
        &self,
        _subscription_id: &str,
        _metric: Metric,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}
