use crate::dtos::UpsertBrandRequest;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn upsert_brand(
    State(state): State<AppState>,
    Path(brand_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpsertBrandRequest>,
) -> Result<impl IntoResponse, AppError> {
    let brand = state.brands.upsert_brand(&req.into_upsert(brand_id)).await?;

    tracing::info!(
        brand_id = %brand.brand_id,
        plan = brand.tier().as_str(),
        "Brand billing profile saved"
    );
    Ok(Json(brand))
}

pub async fn get_brand(
    State(state): State<AppState>,
    Path(brand_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let brand = state
        .brands
        .get_brand(brand_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Brand not found")))?;
    Ok(Json(brand))
}
