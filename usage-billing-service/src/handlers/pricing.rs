use crate::dtos::{CostPriceRequest, PriceQuoteRequest};
use crate::models::PricingContext;
use crate::services::pricing::calculate_price;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn quote_price(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PriceQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quote = match (req.product_id, req.base_product) {
        (Some(product_id), _) => {
            state
                .pricing
                .quote(product_id, req.options, req.rules, req.quantity)
                .await?
        }
        (None, Some(base_product)) => calculate_price(&PricingContext {
            base_product,
            options: req.options,
            rules: req.rules,
            quantity: req.quantity,
        })?,
        (None, None) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Either product_id or base_product is required"
            )))
        }
    };
    Ok(Json(quote))
}

pub async fn cost_price(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<CostPriceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let cost = state
        .pricing
        .calculate_cost_price(product_id, &req.options)
        .await?;
    Ok(Json(cost))
}
