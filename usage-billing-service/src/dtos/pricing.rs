use crate::models::{BaseProduct, DesignOptions, ProductRules};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Either a catalog `product_id` or an inline `base_product` sets the base price.
#[derive(Debug, Deserialize, Validate)]
pub struct PriceQuoteRequest {
    pub product_id: Option<Uuid>,
    pub base_product: Option<BaseProduct>,

    #[serde(default)]
    pub options: DesignOptions,

    #[serde(default)]
    pub rules: ProductRules,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CostPriceRequest {
    #[serde(default)]
    pub options: DesignOptions,
}
