//! Brand scoping for tenant endpoints.
//!
//! The gateway authenticates the caller and forwards the brand it acts for
//! in `X-Brand-ID`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const BRAND_ID_HEADER: &str = "X-Brand-ID";

/// Brand a request acts for.
#[derive(Debug, Clone, Copy)]
pub struct BrandContext(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for BrandContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(BRAND_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", BRAND_ID_HEADER))
            })?;

        let brand_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("Invalid {} header", BRAND_ID_HEADER))
        })?;

        tracing::Span::current().record("brand_id", raw);
        Ok(BrandContext(brand_id))
    }
}
