//! Order pricing for personalized products.

use crate::models::{
    BaseProduct, CostBreakdown, DesignOptions, ImageComplexity, PriceQuote, PricingContext,
    ProductRules, ZoneSelection, ZoneType,
};
use crate::services::amount;
use crate::services::store::ProductStore;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const PREMIUM_FONTS: [&str; 5] = [
    "helvetica-neue",
    "futura",
    "bodoni",
    "garamond",
    "times-new-roman",
];

const SPECIAL_COLORS: [&str; 6] = ["gold", "silver", "rose-gold", "platinum", "copper", "bronze"];

const PREMIUM_KEYWORDS: [&str; 5] = ["premium", "deluxe", "luxury", "professional", "enterprise"];

const BASE_MARGIN: Decimal = Decimal::from_parts(35, 0, 0, false, 2);
const COMPLEX_DESIGN_MARGIN: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
const MAX_MARGIN: Decimal = Decimal::from_parts(60, 0, 0, false, 2);

fn image_zone_price(zone: &ZoneSelection) -> Decimal {
    let mut price = match zone.complexity {
        Some(ImageComplexity::Simple) => 50,
        Some(ImageComplexity::Medium) => 100,
        Some(ImageComplexity::Complex) => 200,
        None => 0,
    };

    if let (Some(width), Some(height)) = (zone.width, zone.height) {
        if u64::from(width) * u64::from(height) > 10_000_000 {
            price += 50;
        }
    }

    price += 25 * zone.effects.len() as i64;
    Decimal::from(price)
}

fn text_zone_price(zone: &ZoneSelection) -> Decimal {
    let mut price = 0i64;

    if let Some(text) = &zone.text {
        let len = text.encode_utf16().count();
        if len > 10 {
            price += len.div_ceil(10) as i64 * 25;
        }
    }

    if let Some(font) = &zone.font {
        if PREMIUM_FONTS.contains(&font.to_lowercase().as_str()) {
            price += 75;
        }
    }

    price += 30 * zone.effects.len() as i64;
    Decimal::from(price)
}

fn color_zone_price(zone: &ZoneSelection) -> Decimal {
    let mut price = 0i64;
    if let Some(color) = &zone.color {
        if SPECIAL_COLORS.contains(&color.to_lowercase().as_str()) {
            price += 100;
        }
    }
    if zone.gradient {
        price += 50;
    }
    Decimal::from(price)
}

fn select_zone_price(zone: &ZoneSelection) -> Decimal {
    match &zone.value {
        Some(value) => {
            let value = value.to_lowercase();
            if PREMIUM_KEYWORDS.iter().any(|k| value.contains(k)) {
                Decimal::from(75)
            } else {
                Decimal::ZERO
            }
        }
        None => Decimal::ZERO,
    }
}

/// Sum of zone deltas and type surcharges. Zones missing from the rules are ignored.
fn zone_price(options: &DesignOptions, rules: &ProductRules) -> Result<Decimal, AppError> {
    let mut total = Decimal::ZERO;
    for (id, selection) in &options.zones {
        let Some(rule) = rules.zone(id) else {
            continue;
        };
        let type_price = match rule.zone_type {
            ZoneType::Image => image_zone_price(selection),
            ZoneType::Text => text_zone_price(selection),
            ZoneType::Color => color_zone_price(selection),
            ZoneType::Select => select_zone_price(selection),
        };
        let delta = rule.price_delta_cents.unwrap_or(Decimal::ZERO);
        total = amount::sum([total, delta, type_price])?;
    }
    Ok(total)
}

fn table_price(
    chosen: &BTreeMap<String, Option<Decimal>>,
    table: Option<&BTreeMap<String, Decimal>>,
) -> Result<Decimal, AppError> {
    let Some(table) = table else {
        return Ok(Decimal::ZERO);
    };
    chosen.iter().try_fold(Decimal::ZERO, |total, (name, quantity)| {
        let price = table.get(name).copied().unwrap_or(Decimal::ZERO);
        amount::add(total, amount::mul(price, quantity.unwrap_or(Decimal::ONE))?)
    })
}

/// Entry with the highest `min_quantity` not above `quantity`.
fn best_tier<T>(entries: &[T], quantity: u32, min_quantity: impl Fn(&T) -> u32) -> Option<&T> {
    entries
        .iter()
        .filter(|e| min_quantity(*e) <= quantity)
        .max_by_key(|e| min_quantity(*e))
}

/// Prices a design for `context.quantity` units. The quantity discount is taken
/// from the bulk unit price when a bulk tier applies.
pub fn calculate_price(context: &PricingContext) -> Result<PriceQuote, AppError> {
    if context.quantity < 1 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Quantity must be at least 1"
        )));
    }

    let PricingContext {
        base_product,
        options,
        rules,
        quantity,
    } = context;
    let pricing = rules.pricing.as_ref();

    let base_price = base_product.price;
    let zone_price = zone_price(options, rules)?;
    let material_price = table_price(&options.materials, pricing.map(|p| &p.material_pricing))?;
    let finish_price = table_price(&options.finishes, pricing.map(|p| &p.finish_pricing))?;
    let computed_unit = amount::sum([base_price, zone_price, material_price, finish_price])?;

    let quantity_price = pricing
        .and_then(|p| best_tier(&p.bulk_pricing, *quantity, |b| b.min_quantity))
        .map(|b| b.price_per_unit)
        .unwrap_or(computed_unit);

    let discount = match pricing
        .and_then(|p| best_tier(&p.quantity_discounts, *quantity, |d| d.min_quantity))
    {
        Some(d) => amount::mul(quantity_price, d.discount_percent)? / Decimal::ONE_HUNDRED,
        None => Decimal::ZERO,
    };

    let unit_price = amount::sub(quantity_price, discount)?;
    let total_price = amount::mul(unit_price, Decimal::from(*quantity))?;

    let breakdown = BTreeMap::from([
        ("base".to_string(), base_price),
        ("zones".to_string(), zone_price),
        ("material".to_string(), material_price),
        ("finish".to_string(), finish_price),
        ("quantity".to_string(), amount::sub(quantity_price, computed_unit)?),
        ("discount".to_string(), discount),
        ("unit".to_string(), unit_price),
        ("total".to_string(), total_price),
    ]);

    tracing::debug!(
        product_id = %base_product.id,
        quantity,
        unit_price = %unit_price,
        total_price = %total_price,
        "Price calculated"
    );

    Ok(PriceQuote {
        base_price,
        zone_price,
        material_price,
        finish_price,
        quantity_price,
        discount,
        unit_price,
        total_price,
        breakdown,
    })
}

/// Extra material cost of the chosen zones.
fn custom_material_cost(options: &DesignOptions) -> Decimal {
    options
        .zones
        .values()
        .map(|z| match z.complexity {
            Some(ImageComplexity::Complex) => Decimal::from(150),
            Some(ImageComplexity::Medium) => Decimal::from(75),
            _ => Decimal::ZERO,
        })
        .sum()
}

fn margin(options: &DesignOptions) -> Decimal {
    let mut margin = BASE_MARGIN;
    if options.complex_zone_count() > 2 {
        margin += COMPLEX_DESIGN_MARGIN;
    }
    margin.min(MAX_MARGIN)
}

pub struct PricingEngine {
    products: Arc<dyn ProductStore>,
}

impl PricingEngine {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    /// Prices a catalog product, using its list price as the base.
    #[instrument(skip(self, options, rules))]
    pub async fn quote(
        &self,
        product_id: Uuid,
        options: DesignOptions,
        rules: ProductRules,
        quantity: u32,
    ) -> Result<PriceQuote, AppError> {
        let product = self
            .products
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        calculate_price(&PricingContext {
            base_product: BaseProduct {
                id: product.product_id,
                price: product.price_cents,
            },
            options,
            rules,
            quantity,
        })
    }

    #[instrument(skip(self, options))]
    pub async fn calculate_cost_price(
        &self,
        product_id: Uuid,
        options: &DesignOptions,
    ) -> Result<CostBreakdown, AppError> {
        let product = self
            .products
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        let material_cost = custom_material_cost(options);
        let total_cost = amount::sum([
            product.base_cost_cents,
            material_cost,
            product.labor_cost_cents,
            product.overhead_cost_cents,
        ])?;

        Ok(CostBreakdown {
            material_cost,
            labor_cost: product.labor_cost_cents,
            overhead_cost: product.overhead_cost_cents,
            total_cost,
            margin: margin(options),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BulkPrice, PricingRules, Product, QuantityDiscount, ZoneRule};
    use crate::services::memory::InMemoryStore;
    use chrono::Utc;

    fn zone(id: &str, zone_type: ZoneType, delta: Option<i64>) -> ZoneRule {
        ZoneRule {
            id: id.to_string(),
            zone_type,
            price_delta_cents: delta.map(Decimal::from),
        }
    }

    fn context(options: DesignOptions, rules: ProductRules, quantity: u32) -> PricingContext {
        PricingContext {
            base_product: BaseProduct {
                id: Uuid::new_v4(),
                price: Decimal::from(2000),
            },
            options,
            rules,
            quantity,
        }
    }

    #[test]
    fn zone_surcharges_by_type() {
        let rules = ProductRules {
            zones: vec![
                zone("front", ZoneType::Image, Some(100)),
                zone("name", ZoneType::Text, None),
                zone("ink", ZoneType::Color, None),
                zone("box", ZoneType::Select, None),
            ],
            pricing: None,
        };

        let mut options = DesignOptions::default();
        options.zones.insert(
            "front".into(),
            ZoneSelection {
                complexity: Some(ImageComplexity::Complex),
                width: Some(4000),
                height: Some(3000),
                effects: vec!["shadow".into(), "glow".into()],
                ..Default::default()
            },
        );
        options.zones.insert(
            "name".into(),
            ZoneSelection {
                text: Some("Happy birthday Marie".into()),
                font: Some("Futura".into()),
                effects: vec!["outline".into()],
                ..Default::default()
            },
        );
        options.zones.insert(
            "ink".into(),
            ZoneSelection {
                color: Some("Rose-Gold".into()),
                gradient: true,
                ..Default::default()
            },
        );
        options.zones.insert(
            "box".into(),
            ZoneSelection {
                value: Some("Deluxe gift box".into()),
                ..Default::default()
            },
        );
        options.zones.insert(
            "unknown".into(),
            ZoneSelection {
                complexity: Some(ImageComplexity::Complex),
                ..Default::default()
            },
        );

        let quote = calculate_price(&context(options, rules, 1)).unwrap();

        // image 100 + 200 + 50 + 50, text 50 + 75 + 30, color 150, select 75
        assert_eq!(quote.zone_price, Decimal::from(780));
        assert_eq!(quote.unit_price, Decimal::from(2780));
        assert_eq!(quote.total_price, Decimal::from(2780));
    }

    #[test]
    fn short_text_and_plain_font_are_free() {
        let rules = ProductRules {
            zones: vec![zone("name", ZoneType::Text, None)],
            pricing: None,
        };
        let mut options = DesignOptions::default();
        options.zones.insert(
            "name".into(),
            ZoneSelection {
                text: Some("Marie".into()),
                font: Some("arial".into()),
                ..Default::default()
            },
        );

        let quote = calculate_price(&context(options, rules, 1)).unwrap();
        assert_eq!(quote.zone_price, Decimal::ZERO);
    }

    #[test]
    fn text_length_counts_utf16_units() {
        let rules = ProductRules {
            zones: vec![zone("name", ZoneType::Text, None)],
            pricing: None,
        };
        let mut options = DesignOptions::default();
        options.zones.insert(
            "name".into(),
            ZoneSelection {
                // six astral-plane characters, twelve UTF-16 units
                text: Some("\u{1F389}".repeat(6)),
                ..Default::default()
            },
        );

        let quote = calculate_price(&context(options, rules, 1)).unwrap();
        assert_eq!(quote.zone_price, Decimal::from(50));
    }

    #[test]
    fn bulk_then_discount_on_the_bulk_unit() {
        let rules = ProductRules {
            zones: vec![],
            pricing: Some(PricingRules {
                material_pricing: BTreeMap::from([("leather".to_string(), Decimal::from(300))]),
                finish_pricing: BTreeMap::from([("gloss".to_string(), Decimal::from(40))]),
                quantity_discounts: vec![
                    QuantityDiscount {
                        min_quantity: 10,
                        discount_percent: Decimal::from(5),
                    },
                    QuantityDiscount {
                        min_quantity: 50,
                        discount_percent: Decimal::from(10),
                    },
                ],
                bulk_pricing: vec![
                    BulkPrice {
                        min_quantity: 20,
                        price_per_unit: Decimal::from(2000),
                    },
                    BulkPrice {
                        min_quantity: 100,
                        price_per_unit: Decimal::from(1800),
                    },
                ],
            }),
        };
        let mut options = DesignOptions::default();
        options
            .materials
            .insert("leather".into(), Some(Decimal::from(2)));
        options.finishes.insert("gloss".into(), None);
        options.finishes.insert("matte".into(), None);

        let quote = calculate_price(&context(options, rules, 60)).unwrap();

        assert_eq!(quote.material_price, Decimal::from(600));
        assert_eq!(quote.finish_price, Decimal::from(40));
        assert_eq!(quote.quantity_price, Decimal::from(2000));
        assert_eq!(quote.discount, Decimal::from(200));
        assert_eq!(quote.unit_price, Decimal::from(1800));
        assert_eq!(quote.total_price, Decimal::from(108_000));
        assert_eq!(quote.breakdown["quantity"], Decimal::from(-640));
    }

    #[test]
    fn no_matching_tier_keeps_the_computed_unit() {
        let rules = ProductRules {
            zones: vec![],
            pricing: Some(PricingRules {
                bulk_pricing: vec![BulkPrice {
                    min_quantity: 20,
                    price_per_unit: Decimal::from(1000),
                }],
                ..Default::default()
            }),
        };

        let quote = calculate_price(&context(DesignOptions::default(), rules, 3)).unwrap();
        assert_eq!(quote.unit_price, Decimal::from(2000));
        assert_eq!(quote.discount, Decimal::ZERO);
        assert_eq!(quote.total_price, Decimal::from(6000));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let result = calculate_price(&context(
            DesignOptions::default(),
            ProductRules::default(),
            0,
        ));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn oversized_total_is_rejected_instead_of_overflowing() {
        let mut oversized = context(DesignOptions::default(), ProductRules::default(), 2);
        oversized.base_product.price = Decimal::MAX;

        let result = calculate_price(&oversized);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn cost_price_with_complex_design() {
        let store = Arc::new(InMemoryStore::new());
        let product_id = Uuid::new_v4();
        store.insert_product(Product {
            product_id,
            name: "Tote bag".into(),
            price_cents: Decimal::from(2500),
            base_cost_cents: Decimal::from(800),
            labor_cost_cents: Decimal::from(300),
            overhead_cost_cents: Decimal::from(100),
            created_utc: Utc::now(),
        });
        let engine = PricingEngine::new(store);

        let mut options = DesignOptions::default();
        for id in ["a", "b", "c"] {
            options.zones.insert(
                id.into(),
                ZoneSelection {
                    complexity: Some(ImageComplexity::Complex),
                    ..Default::default()
                },
            );
        }
        options.zones.insert(
            "d".into(),
            ZoneSelection {
                complexity: Some(ImageComplexity::Medium),
                ..Default::default()
            },
        );

        let cost = engine.calculate_cost_price(product_id, &options).await.unwrap();
        assert_eq!(cost.material_cost, Decimal::from(525));
        assert_eq!(cost.total_cost, Decimal::from(1725));
        assert_eq!(cost.margin, Decimal::new(40, 2));

        let missing = engine
            .calculate_cost_price(Uuid::new_v4(), &options)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
