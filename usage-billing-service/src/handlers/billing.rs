use crate::dtos::{EstimateParams, ProjectionParams, TaxRateResponse};
use crate::middleware::BrandContext;
use crate::startup::AppState;
use crate::utils::ValidatedQuery;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn current_bill(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.billing.current_bill(brand_id).await?))
}

pub async fn estimate_action_cost(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedQuery(params): ValidatedQuery<EstimateParams>,
) -> Result<impl IntoResponse, AppError> {
    let estimate = state
        .billing
        .estimate_action_cost(brand_id, params.metric, params.quantity)
        .await?;
    Ok(Json(estimate))
}

pub async fn project_costs(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedQuery(params): ValidatedQuery<ProjectionParams>,
) -> Result<impl IntoResponse, AppError> {
    let projection = state
        .billing
        .project_costs(brand_id, params.days())
        .await?;
    Ok(Json(projection))
}

pub async fn compare_plans(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.billing.compare_plans(brand_id).await?))
}

pub async fn tax_rate(State(state): State<AppState>, Path(country): Path<String>) -> impl IntoResponse {
    let tax_rate = state.billing.tax_rate(&country);
    Json(TaxRateResponse {
        country: country.to_ascii_uppercase(),
        tax_rate,
    })
}
