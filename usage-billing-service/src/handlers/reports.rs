use crate::dtos::{DateRangeParams, MonthlyReportParams};
use crate::middleware::BrandContext;
use crate::services::BillingPeriod;
use crate::startup::AppState;
use crate::utils::{parse_metric, ValidatedQuery};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

pub async fn monthly_report(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedQuery(params): ValidatedQuery<MonthlyReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let current = BillingPeriod::containing(Utc::now());
    let year = params.year.unwrap_or_else(|| current.year());
    let month = params.month.unwrap_or_else(|| current.month_number());

    let report = state.reporter.monthly_report(brand_id, year, month).await?;
    Ok(Json(report))
}

pub async fn export_csv(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    ValidatedQuery(range): ValidatedQuery<DateRangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let csv = state
        .reporter
        .export_csv(brand_id, range.start, range.end)
        .await?;
    let disposition = format!(
        "attachment; filename=\"usage-{}-{}.csv\"",
        range.start.format("%Y%m%d"),
        range.end.format("%Y%m%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

pub async fn executive_summary(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.reporter.executive_summary(brand_id).await?))
}

pub async fn metric_detail(
    State(state): State<AppState>,
    BrandContext(brand_id): BrandContext,
    Path(metric): Path<String>,
    ValidatedQuery(range): ValidatedQuery<DateRangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let metric = parse_metric(&metric)?;
    let detail = state
        .reporter
        .metric_detail(brand_id, metric, range.start, range.end)
        .await?;
    Ok(Json(detail))
}
