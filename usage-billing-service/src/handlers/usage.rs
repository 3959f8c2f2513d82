use crate::dtos::{
    BatchUsageRequest, BatchUsageResponse, ConsumeRequest, CurrentUsageResponse,
    ProviderUsageParams, ProviderUsageResponse, RecordUsageRequest,
};
use crate::middleware::BrandContext;
use crate::services::BillingPeriod;
use crate::startup::AppState;
use crate::utils::{ValidatedJson, ValidatedQuery};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use service_core::error::AppError;

pub async fn record_usage(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedJson(req): ValidatedJson<RecordUsageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .meter
        .record_usage(brand_id, req.metric, req.value, req.metadata)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

pub async fn batch_record_usage(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedJson(req): ValidatedJson<BatchUsageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let items = req.items.into_iter().map(|i| (i.metric, i.value)).collect();
    let records = state.meter.batch_record_usage(brand_id, items).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchUsageResponse {
            count: records.len(),
            records,
        }),
    ))
}

/// Quota-enforced write. A blocked metric over its limit is rejected and
/// nothing is recorded.
pub async fn consume_usage(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedJson(req): ValidatedJson<ConsumeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let consumption = state
        .quotas
        .consume(brand_id, req.metric, req.amount, req.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(consumption)))
}

pub async fn current_usage(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
) -> Result<impl IntoResponse, AppError> {
    let usage = state.meter.current_usage(brand_id).await?;
    Ok(Json(CurrentUsageResponse {
        brand_id,
        period: BillingPeriod::containing(Utc::now()).view(),
        usage,
    }))
}

pub async fn provider_usage(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedQuery(params): ValidatedQuery<ProviderUsageParams>,
) -> Result<impl IntoResponse, AppError> {
    let total = state
        .meter
        .provider_usage(brand_id, params.metric, params.start, params.end)
        .await?;
    Ok(Json(ProviderUsageResponse {
        metric: params.metric,
        start: params.start,
        end: params.end,
        total,
    }))
}
