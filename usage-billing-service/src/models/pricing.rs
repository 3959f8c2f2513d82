//! Design-based product pricing inputs and outputs. Amounts are in cents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Catalog product with its cost components.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: Decimal,
    pub base_cost_cents: Decimal,
    pub labor_cost_cents: Decimal,
    pub overhead_cost_cents: Decimal,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Image,
    Text,
    Color,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageComplexity {
    Simple,
    Medium,
    Complex,
}

/// A customizable area of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRule {
    pub id: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    #[serde(default)]
    pub price_delta_cents: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityDiscount {
    pub min_quantity: u32,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPrice {
    pub min_quantity: u32,
    pub price_per_unit: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingRules {
    pub material_pricing: BTreeMap<String, Decimal>,
    pub finish_pricing: BTreeMap<String, Decimal>,
    pub quantity_discounts: Vec<QuantityDiscount>,
    pub bulk_pricing: Vec<BulkPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRules {
    pub zones: Vec<ZoneRule>,
    pub pricing: Option<PricingRules>,
}

impl ProductRules {
    pub fn zone(&self, id: &str) -> Option<&ZoneRule> {
        self.zones.iter().find(|z| z.id == id)
    }
}

/// What the customer chose for one zone. Fields apply depending on the zone type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSelection {
    pub complexity: Option<ImageComplexity>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub effects: Vec<String>,
    pub text: Option<String>,
    pub font: Option<String>,
    pub color: Option<String>,
    pub gradient: bool,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignOptions {
    pub zones: BTreeMap<String, ZoneSelection>,
    /// Material name to quantity. A missing quantity counts as one.
    pub materials: BTreeMap<String, Option<Decimal>>,
    /// Finish name to quantity. A missing quantity counts as one.
    pub finishes: BTreeMap<String, Option<Decimal>>,
}

impl DesignOptions {
    /// Zones whose selection is a complex image.
    pub fn complex_zone_count(&self) -> usize {
        self.zones
            .values()
            .filter(|z| z.complexity == Some(ImageComplexity::Complex))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseProduct {
    pub id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingContext {
    pub base_product: BaseProduct,
    pub options: DesignOptions,
    pub rules: ProductRules,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_price: Decimal,
    pub zone_price: Decimal,
    pub material_price: Decimal,
    pub finish_price: Decimal,
    /// Per-unit price after bulk pricing, before the quantity discount.
    pub quantity_price: Decimal,
    pub discount: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
    pub total_cost: Decimal,
    pub margin: Decimal,
}
