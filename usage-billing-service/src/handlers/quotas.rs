use crate::dtos::{AmountParams, AmountRequest};
use crate::middleware::BrandContext;
use crate::startup::AppState;
use crate::utils::{parse_metric, ValidatedJson, ValidatedQuery};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn check_quota(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    Path(metric): Path<String>,
    ValidatedQuery(params): ValidatedQuery<AmountParams>,
) -> Result<impl IntoResponse, AppError> {
    let metric = parse_metric(&metric)?;
    let check = state
        .quotas
        .check_quota(brand_id, metric, params.amount)
        .await?;
    Ok(Json(check))
}

pub async fn enforce_quota(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    Path(metric): Path<String>,
    ValidatedJson(req): ValidatedJson<AmountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let metric = parse_metric(&metric)?;
    let check = state
        .quotas
        .enforce_quota(brand_id, metric, req.amount)
        .await?;
    Ok(Json(check))
}

pub async fn usage_summary(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.quotas.usage_summary(brand_id).await?))
}
