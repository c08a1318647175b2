// src/services/reconciliation_service.rs

use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{inventory_repo::ListItemsFilter, DemandRepository, InventoryRepository},
    models::reconciliation::{evaluate_items, expected_reservations, ReconciliationReport},
    services::stock_service::StockService,
};

/// Auditor de consistência: re-deriva a reserva esperada de cada lote a
/// partir das solicitações COMMITTED e compara com o que está gravado.
/// Em modo de aplicação, cada correção roda em transação própria — uma
/// falha isolada não aborta a varredura.
#[derive(Clone)]
pub struct ReconciliationService {
    inventory_repo: InventoryRepository,
    demand_repo: DemandRepository,
    stock_service: StockService,
}

impl ReconciliationService {
    pub fn new(
        inventory_repo: InventoryRepository,
        demand_repo: DemandRepository,
        stock_service: StockService,
    ) -> Self {
        Self {
            inventory_repo,
            demand_repo,
            stock_service,
        }
    }

    pub async fn run(
        &self,
        tenant_id: Uuid,
        dry_run: bool,
        actor_id: Uuid,
    ) -> Result<ReconciliationReport, AppError> {
        let items = self
            .inventory_repo
            .list_items(tenant_id, &ListItemsFilter::default())
            .await?;
        let committed_lines = self.demand_repo.committed_lines(tenant_id).await?;
        let committed_demands = self.demand_repo.committed_count(tenant_id).await?;

        let expected = expected_reservations(committed_lines);
        let findings = evaluate_items(&items, &expected);
        let critical = findings.iter().filter(|f| f.critical).count();

        let mut corrected = 0;
        if !dry_run {
            for finding in &findings {
                // Sobre-compromisso exige intervenção humana: corrigir
                // automaticamente esconderia o problema.
                if finding.critical {
                    tracing::error!(
                        target: "invariant_violation",
                        item_id = %finding.inventory_item_id,
                        lot = %finding.lot,
                        expected_reserved = finding.expected_reserved,
                        initial = finding.initial_quantity,
                        "Sobre-compromisso detectado na reconciliação"
                    );
                    continue;
                }
                match self
                    .stock_service
                    .apply_correction(tenant_id, finding, actor_id)
                    .await
                {
                    Ok(true) => corrected += 1,
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(
                            item_id = %finding.inventory_item_id,
                            error = %err,
                            "Falha ao corrigir lote; varredura continua"
                        );
                    }
                }
            }
        }

        let report = ReconciliationReport {
            tenant_id,
            dry_run,
            items_checked: items.len(),
            committed_demands: committed_demands as usize,
            discrepant: findings.len(),
            corrected,
            critical,
            findings,
            executed_at: Utc::now(),
        };

        tracing::info!(
            %tenant_id,
            dry_run,
            items = report.items_checked,
            discrepant = report.discrepant,
            corrected = report.corrected,
            critical = report.critical,
            "Reconciliação concluída"
        );
        Ok(report)
    }
}
