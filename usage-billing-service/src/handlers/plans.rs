use crate::models::PlanTier;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

pub async fn list_plans(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.quotas.all_plans().to_vec())
}

/// Unknown tiers resolve to starter, as they do for brands.
pub async fn get_plan(State(state): State<AppState>, Path(plan): Path<String>) -> impl IntoResponse {
    Json(state.quotas.plan_limits(PlanTier::from_string(&plan)).clone())
}
