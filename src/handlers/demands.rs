// src/handlers/demands.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::demand_repo::ListDemandsFilter,
    middleware::{actor::ActorContext, tenancy::TenantContext},
    models::demand::{DemandStats, DemandStatus, DemandWithLines},
    services::demand_service::{CreateDemandInput, DemandAction, DemandLineInput},
};

// ---
// Payload: criação
// ---
#[derive(Debug, serde::Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemandLinePayload {
    pub inventory_item_id: Uuid,

    #[validate(range(min = 1, message = "A quantidade da linha deve ser maior que zero."))]
    #[schema(example = 4)]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDemandPayload {
    /// Código externo do sujeito atendido (ex.: paciente).
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub notes: Option<String>,

    #[validate(length(min = 1, message = "A solicitação precisa de ao menos uma linha."), nested)]
    pub lines: Vec<DemandLinePayload>,
}

// POST /api/demands
#[utoipa::path(
    post,
    path = "/api/demands",
    tag = "Demands",
    request_body = CreateDemandPayload,
    responses(
        (status = 201, description = "Solicitação registrada em PENDING", body = DemandWithLines),
        (status = 409, description = "Saldo disponível insuficiente em alguma linha"),
        (status = 422, description = "Linha referencia lote inexistente ou desativado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do solicitante")
    )
)]
pub async fn create_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Json(payload): Json<CreateDemandPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = CreateDemandInput {
        subject_id: payload.subject_id,
        subject_name: payload.subject_name,
        notes: payload.notes,
        lines: payload
            .lines
            .into_iter()
            .map(|line| DemandLineInput {
                inventory_item_id: line.inventory_item_id,
                quantity: line.quantity,
            })
            .collect(),
    };
    let demand = app_state
        .demand_service
        .create(tenant.0, actor.0, input)
        .await?;

    Ok((StatusCode::CREATED, Json(demand)))
}

// ---
// Listagem
// ---
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDemandsQuery {
    pub status: Option<DemandStatus>,
    pub subject_id: Option<String>,
    pub limit: Option<i64>,
}

// GET /api/demands
#[utoipa::path(
    get,
    path = "/api/demands",
    tag = "Demands",
    responses(
        (status = 200, description = "Solicitações do tenant, mais recentes primeiro", body = [DemandWithLines])
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("status" = Option<DemandStatus>, Query, description = "Filtra por status"),
        ("subjectId" = Option<String>, Query, description = "Filtra por sujeito"),
        ("limit" = Option<i64>, Query, description = "Limite de registros")
    )
)]
pub async fn list_demands(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListDemandsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListDemandsFilter {
        status: query.status,
        subject_id: query.subject_id,
        limit: query.limit,
    };
    let demands = app_state.demand_service.list(tenant.0, &filter).await?;
    Ok(Json(demands))
}

// GET /api/demands/stats
#[utoipa::path(
    get,
    path = "/api/demands/stats",
    tag = "Demands",
    responses(
        (status = 200, description = "Contagem de solicitações por status", body = DemandStats)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    )
)]
pub async fn stats(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.demand_service.stats(tenant.0).await?;
    Ok(Json(stats))
}

// GET /api/demands/{id}
#[utoipa::path(
    get,
    path = "/api/demands/{id}",
    tag = "Demands",
    responses(
        (status = 200, description = "Solicitação encontrada", body = DemandWithLines),
        (status = 404, description = "Solicitação não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    )
)]
pub async fn get_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(demand_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let demand = app_state
        .demand_service
        .get_with_lines(tenant.0, demand_id)
        .await?;
    Ok(Json(demand))
}

// ---
// Transições
// ---

// POST /api/demands/{id}/commit
#[utoipa::path(
    post,
    path = "/api/demands/{id}/commit",
    tag = "Demands",
    responses(
        (status = 200, description = "Reserva efetivada; solicitação em COMMITTED", body = DemandWithLines),
        (status = 409, description = "Transição inválida ou saldo insuficiente")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do aprovador")
    )
)]
pub async fn commit_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(demand_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let demand = app_state
        .demand_service
        .transition(tenant.0, demand_id, actor.0, DemandAction::Commit)
        .await?;
    Ok(Json(demand))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectDemandPayload {
    #[validate(length(min = 1, message = "O motivo da recusa é obrigatório."))]
    #[schema(example = "Protocolo suspenso")]
    pub reason: String,
}

// POST /api/demands/{id}/reject
#[utoipa::path(
    post,
    path = "/api/demands/{id}/reject",
    tag = "Demands",
    request_body = RejectDemandPayload,
    responses(
        (status = 200, description = "Solicitação recusada", body = DemandWithLines),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do revisor")
    )
)]
pub async fn reject_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(demand_id): Path<Uuid>,
    Json(payload): Json<RejectDemandPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let demand = app_state
        .demand_service
        .transition(
            tenant.0,
            demand_id,
            actor.0,
            DemandAction::Reject {
                reason: payload.reason,
            },
        )
        .await?;
    Ok(Json(demand))
}

// POST /api/demands/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/demands/{id}/cancel",
    tag = "Demands",
    responses(
        (status = 200, description = "Reserva devolvida; solicitação em CANCELLED", body = DemandWithLines),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do executor")
    )
)]
pub async fn cancel_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(demand_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let demand = app_state
        .demand_service
        .transition(tenant.0, demand_id, actor.0, DemandAction::Cancel)
        .await?;
    Ok(Json(demand))
}

// POST /api/demands/{id}/fulfill
#[utoipa::path(
    post,
    path = "/api/demands/{id}/fulfill",
    tag = "Demands",
    responses(
        (status = 200, description = "Reserva consumida; solicitação em FULFILLED", body = DemandWithLines),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da solicitação"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do executor")
    )
)]
pub async fn fulfill_demand(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(demand_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let demand = app_state
        .demand_service
        .transition(tenant.0, demand_id, actor.0, DemandAction::Fulfill)
        .await?;
    Ok(Json(demand))
}
