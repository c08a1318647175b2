// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho HTTP que identifica o tenant da requisição.
const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Extrator do escopo de tenant. Toda consulta e mutação carrega este id;
/// nenhum handler opera sem ele.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or(AppError::InvalidTenantHeader)?;

        Ok(TenantContext(tenant_id))
    }
}
