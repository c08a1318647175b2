// src/handlers/reconciliation.rs

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{actor::ActorContext, tenancy::TenantContext},
    models::reconciliation::ReconciliationReport,
};

fn default_dry_run() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunReconciliationPayload {
    /// Em dry-run (padrão) o relatório apenas descreve as divergências;
    /// `false` aplica as correções não críticas.
    #[serde(default = "default_dry_run")]
    #[schema(example = true)]
    pub dry_run: bool,
}

impl Default for RunReconciliationPayload {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

// POST /api/reconciliation/run
// O corpo é opcional: uma chamada sem JSON roda em dry-run.
#[utoipa::path(
    post,
    path = "/api/reconciliation/run",
    tag = "Reconciliation",
    request_body(content = RunReconciliationPayload, description = "Opcional; sem corpo = dry-run"),
    responses(
        (status = 200, description = "Relatório da varredura", body = ReconciliationReport)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do executor")
    )
)]
pub async fn run_reconciliation(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    payload: Option<Json<RunReconciliationPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let report = app_state
        .reconciliation_service
        .run(tenant.0, payload.dry_run, actor.0)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_body_and_empty_object_both_mean_dry_run() {
        assert!(RunReconciliationPayload::default().dry_run);

        let from_empty: RunReconciliationPayload = serde_json::from_str("{}").unwrap();
        assert!(from_empty.dry_run);

        let explicit: RunReconciliationPayload =
            serde_json::from_str(r#"{"dryRun": false}"#).unwrap();
        assert!(!explicit.dry_run);
    }
}
