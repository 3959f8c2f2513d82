//! Brand (billing tenant) model.

use super::PlanTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Country used for tax when a brand has none on file.
pub const DEFAULT_COUNTRY: &str = "FR";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Brand {
    pub brand_id: Uuid,
    pub name: String,
    pub plan: Option<String>,
    pub country: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Brand {
    pub fn tier(&self) -> PlanTier {
        self.plan
            .as_deref()
            .map(PlanTier::from_string)
            .unwrap_or(PlanTier::Starter)
    }

    pub fn country_code(&self) -> &str {
        self.country.as_deref().unwrap_or(DEFAULT_COUNTRY)
    }
}

/// Input for creating or updating a brand.
#[derive(Debug, Clone)]
pub struct UpsertBrand {
    pub brand_id: Uuid,
    pub name: String,
    pub plan: Option<PlanTier>,
    pub country: Option<String>,
    pub provider_subscription_id: Option<String>,
}
