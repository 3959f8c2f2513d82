use crate::models::{PlanTier, UpsertBrand};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertBrandRequest {
    #[validate(length(min = 1, max = 200, message = "Brand name is required"))]
    pub name: String,

    pub plan: Option<PlanTier>,

    /// ISO 3166-1 alpha-2 code, used for tax.
    #[validate(length(equal = 2, message = "Country must be a two-letter code"))]
    pub country: Option<String>,

    #[validate(length(min = 1, message = "Subscription id must not be empty"))]
    pub provider_subscription_id: Option<String>,
}

impl UpsertBrandRequest {
    pub fn into_upsert(self, brand_id: Uuid) -> UpsertBrand {
        UpsertBrand {
            brand_id,
            name: self.name,
            plan: self.plan,
            country: self.country.map(|c| c.to_ascii_uppercase()),
            provider_subscription_id: self.provider_subscription_id,
        }
    }
}
