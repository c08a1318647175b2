// src/handlers/inventory.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    db::inventory_repo::{ListItemsFilter, NewInventoryItem},
    middleware::{actor::ActorContext, tenancy::TenantContext},
    models::inventory::{InventoryItem, InventoryStats, StockMovement},
};

// ---
// Validação customizada
// ---
fn validate_not_negative_price(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O preço unitário não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payload: CreateItem
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    #[validate(length(min = 1, message = "O código do produto é obrigatório."))]
    #[schema(example = "MED-0417")]
    pub product_code: String,

    #[validate(length(min = 1, message = "O lote é obrigatório."))]
    #[schema(example = "L2025-08A")]
    pub lot: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Paracetamol 500mg")]
    pub display_name: String,

    #[validate(range(min = 0, message = "A quantidade inicial não pode ser negativa."))]
    #[schema(example = 120)]
    pub initial_quantity: i64,

    #[validate(custom(function = "validate_not_negative_price"))]
    #[serde(default)]
    pub unit_price: Decimal,

    pub expiration_date: Option<NaiveDate>,

    /// Data da entrada física; hoje, se omitida.
    pub entry_date: Option<NaiveDate>,
}

// POST /api/inventory
#[utoipa::path(
    post,
    path = "/api/inventory",
    tag = "Inventory",
    request_body = CreateItemPayload,
    responses(
        (status = 201, description = "Lote cadastrado", body = InventoryItem),
        (status = 409, description = "Já existe lote ativo com o mesmo código e lote")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do usuário executor")
    )
)]
pub async fn create_item(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let new_item = NewInventoryItem {
        product_code: payload.product_code,
        lot: payload.lot,
        display_name: payload.display_name,
        initial_quantity: payload.initial_quantity,
        unit_price: payload.unit_price,
        expiration_date: payload.expiration_date,
        entry_date: payload.entry_date,
    };
    let item = app_state
        .stock_service
        .create_item(tenant.0, actor.0, new_item)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

// ---
// Listagem
// ---
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub product_code: Option<String>,
    pub expiring_before: Option<NaiveDate>,
    pub low_stock_below: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

// GET /api/inventory
#[utoipa::path(
    get,
    path = "/api/inventory",
    tag = "Inventory",
    responses(
        (status = 200, description = "Lotes do tenant", body = [InventoryItem])
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("productCode" = Option<String>, Query, description = "Filtra por código de produto"),
        ("expiringBefore" = Option<NaiveDate>, Query, description = "Lotes que vencem antes da data"),
        ("lowStockBelow" = Option<i64>, Query, description = "Lotes com disponível abaixo do limite"),
        ("includeInactive" = Option<bool>, Query, description = "Inclui lotes desativados")
    )
)]
pub async fn list_items(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListItemsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListItemsFilter {
        product_code: query.product_code,
        expiring_before: query.expiring_before,
        low_stock_below: query.low_stock_below,
        include_inactive: query.include_inactive,
    };
    let items = app_state.stock_service.list_items(tenant.0, &filter).await?;
    Ok(Json(items))
}

// GET /api/inventory/stats
#[utoipa::path(
    get,
    path = "/api/inventory/stats",
    tag = "Inventory",
    responses(
        (status = 200, description = "Resumo do estoque do tenant", body = InventoryStats)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    )
)]
pub async fn stats(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.stock_service.stats(tenant.0).await?;
    Ok(Json(stats))
}

// GET /api/inventory/{id}
#[utoipa::path(
    get,
    path = "/api/inventory/{id}",
    tag = "Inventory",
    responses(
        (status = 200, description = "Lote encontrado", body = InventoryItem),
        (status = 404, description = "Lote não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    )
)]
pub async fn get_item(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state.stock_service.get_item(tenant.0, item_id).await?;
    Ok(Json(item))
}

// ---
// Payload: ajuste de estoque (entrada avulsa ou saída direta)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockPayload {
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    #[schema(example = 30)]
    pub quantity: i64,

    #[validate(length(min = 1, message = "O motivo é obrigatório."))]
    #[schema(example = "Reposição do fornecedor")]
    pub reason: String,
}

// POST /api/inventory/{id}/entries
#[utoipa::path(
    post,
    path = "/api/inventory/{id}/entries",
    tag = "Inventory",
    request_body = AdjustStockPayload,
    responses(
        (status = 200, description = "Entrada registrada", body = InventoryItem),
        (status = 404, description = "Lote não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do usuário executor")
    )
)]
pub async fn add_stock(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStockPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .stock_service
        .add_stock(tenant.0, item_id, payload.quantity, &payload.reason, actor.0)
        .await?;
    Ok(Json(item))
}

// POST /api/inventory/{id}/withdrawals
#[utoipa::path(
    post,
    path = "/api/inventory/{id}/withdrawals",
    tag = "Inventory",
    request_body = AdjustStockPayload,
    responses(
        (status = 200, description = "Saída registrada", body = InventoryItem),
        (status = 409, description = "Saldo disponível insuficiente")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do usuário executor")
    )
)]
pub async fn withdraw_stock(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStockPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .stock_service
        .withdraw_stock(tenant.0, item_id, payload.quantity, &payload.reason, actor.0)
        .await?;
    Ok(Json(item))
}

// GET /api/inventory/{id}/movements
#[utoipa::path(
    get,
    path = "/api/inventory/{id}/movements",
    tag = "Inventory",
    responses(
        (status = 200, description = "Livro-razão do lote, mais recente primeiro", body = [StockMovement]),
        (status = 404, description = "Lote não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    )
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let movements = app_state
        .stock_service
        .list_movements(tenant.0, item_id)
        .await?;
    Ok(Json(movements))
}

// DELETE /api/inventory/{id}
#[utoipa::path(
    delete,
    path = "/api/inventory/{id}",
    tag = "Inventory",
    responses(
        (status = 204, description = "Lote desativado"),
        (status = 409, description = "Lote com reserva pendente")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant"),
        ("x-actor-id" = Uuid, Header, description = "ID do usuário executor")
    )
)]
pub async fn deactivate_item(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    actor: ActorContext,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .stock_service
        .deactivate_item(tenant.0, item_id, actor.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
