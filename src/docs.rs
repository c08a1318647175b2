// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Inventory ---
        handlers::inventory::create_item,
        handlers::inventory::list_items,
        handlers::inventory::stats,
        handlers::inventory::get_item,
        handlers::inventory::add_stock,
        handlers::inventory::withdraw_stock,
        handlers::inventory::list_movements,
        handlers::inventory::deactivate_item,

        // --- Demands ---
        handlers::demands::create_demand,
        handlers::demands::list_demands,
        handlers::demands::stats,
        handlers::demands::get_demand,
        handlers::demands::commit_demand,
        handlers::demands::reject_demand,
        handlers::demands::cancel_demand,
        handlers::demands::fulfill_demand,

        // --- Reconciliation ---
        handlers::reconciliation::run_reconciliation,
    ),
    components(
        schemas(
            // --- Inventory ---
            models::inventory::InventoryItem,
            models::inventory::MovementKind,
            models::inventory::StockMovement,
            models::inventory::InventoryStats,
            handlers::inventory::CreateItemPayload,
            handlers::inventory::AdjustStockPayload,

            // --- Demands ---
            models::demand::DemandStatus,
            models::demand::DemandRecord,
            models::demand::DemandLineItem,
            models::demand::DemandWithLines,
            models::demand::DemandStats,
            handlers::demands::CreateDemandPayload,
            handlers::demands::DemandLinePayload,
            handlers::demands::RejectDemandPayload,

            // --- Reconciliation ---
            models::reconciliation::Discrepancy,
            models::reconciliation::ReconciliationReport,
            handlers::reconciliation::RunReconciliationPayload,
        )
    ),
    tags(
        (name = "Inventory", description = "Lotes, saldos e livro-razão"),
        (name = "Demands", description = "Solicitações e seu ciclo de vida"),
        (name = "Reconciliation", description = "Auditoria de consistência de reservas")
    )
)]
pub struct ApiDoc;
