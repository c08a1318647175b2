// src/services/stock_service.rs

use sqlx::PgPool;
use tokio::time::sleep;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{backoff_delay, should_retry, surface_conflict},
        error::AppError,
    },
    db::InventoryRepository,
    models::{
        inventory::{InventoryItem, InventoryStats, MovementKind, StockMovement},
        reconciliation::Discrepancy,
    },
};
use crate::db::inventory_repo::{ListItemsFilter, NewInventoryItem};

/// Motor de ajuste de estoque: toda mudança de quantidade acontece em uma
/// transação que trava o lote, aplica a mutação validada e registra a
/// movimentação correspondente no livro-razão.
#[derive(Clone)]
pub struct StockService {
    pool: PgPool,
    inventory_repo: InventoryRepository,
}

impl StockService {
    pub fn new(pool: PgPool, inventory_repo: InventoryRepository) -> Self {
        Self {
            pool,
            inventory_repo,
        }
    }

    // ---
    // Leituras
    // ---

    pub async fn get_item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<InventoryItem, AppError> {
        self.inventory_repo.get_item(tenant_id, item_id).await
    }

    pub async fn list_items(
        &self,
        tenant_id: Uuid,
        filter: &ListItemsFilter,
    ) -> Result<Vec<InventoryItem>, AppError> {
        self.inventory_repo.list_items(tenant_id, filter).await
    }

    pub async fn list_movements(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        // Garante 404 para lote inexistente em vez de histórico vazio.
        self.inventory_repo.get_item(tenant_id, item_id).await?;
        self.inventory_repo.list_movements(tenant_id, item_id).await
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<InventoryStats, AppError> {
        self.inventory_repo.stats(tenant_id).await
    }

    // ---
    // Escritas
    // ---

    /// Cadastra um lote novo e registra a entrada inicial no livro-razão.
    pub async fn create_item(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        new_item: NewInventoryItem,
    ) -> Result<InventoryItem, AppError> {
        let mut tx = self.pool.begin().await?;

        let item = self
            .inventory_repo
            .create_item(&mut *tx, tenant_id, &new_item)
            .await?;
        if item.initial_quantity > 0 {
            self.inventory_repo
                .record_movement(
                    &mut *tx,
                    tenant_id,
                    item.id,
                    MovementKind::Entry,
                    item.initial_quantity,
                    0,
                    item.available_quantity,
                    "Entrada inicial do lote",
                    actor_id,
                    None,
                )
                .await?;
        }

        tx.commit().await?;
        tracing::info!(item_id = %item.id, lot = %item.lot, "Lote cadastrado");
        Ok(item)
    }

    /// Entrada avulsa: credita a base e o disponível do lote.
    pub async fn add_stock(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<InventoryItem, AppError> {
        self.adjust(tenant_id, item_id, MovementKind::Entry, quantity, reason, actor_id)
            .await
    }

    /// Saída direta (perda, descarte, uso sem solicitação): debita o
    /// disponível e a base do lote.
    pub async fn withdraw_stock(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<InventoryItem, AppError> {
        self.adjust(tenant_id, item_id, MovementKind::Exit, quantity, reason, actor_id)
            .await
    }

    async fn adjust(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        kind: MovementKind,
        quantity: i64,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<InventoryItem, AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidLineItem(
                "A quantidade do ajuste deve ser positiva".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_adjust(tenant_id, item_id, kind, quantity, reason, actor_id)
                .await
            {
                Ok(item) => return Ok(item),
                Err(err) if should_retry(&err, attempt) => {
                    tracing::warn!(%item_id, attempt, "Conflito de transação no ajuste; repetindo");
                    sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(surface_conflict(err)),
            }
        }
    }

    async fn try_adjust(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        kind: MovementKind,
        quantity: i64,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<InventoryItem, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut item = self
            .inventory_repo
            .get_item_for_update(&mut *tx, tenant_id, item_id)
            .await?;
        let previous_available = item.available_quantity;

        let signed_quantity = match kind {
            MovementKind::Entry => {
                item.enter(quantity)?;
                quantity
            }
            MovementKind::Exit => {
                item.withdraw(quantity)?;
                -quantity
            }
            MovementKind::Adjustment => {
                return Err(AppError::InvalidLineItem(
                    "Ajustes absolutos são exclusivos da reconciliação".to_string(),
                ));
            }
        };

        self.inventory_repo.update_quantities(&mut *tx, &item).await?;
        self.inventory_repo
            .record_movement(
                &mut *tx,
                tenant_id,
                item.id,
                kind,
                signed_quantity,
                previous_available,
                item.available_quantity,
                reason,
                actor_id,
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Desativação lógica; recusada enquanto houver reserva pendente.
    pub async fn deactivate_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let mut item = self
            .inventory_repo
            .get_item_for_update(&mut *tx, tenant_id, item_id)
            .await?;
        item.deactivate(actor_id)?;
        self.inventory_repo
            .deactivate(&mut *tx, tenant_id, item_id, actor_id)
            .await?;

        tx.commit().await?;
        tracing::info!(%item_id, actor = %actor_id, "Lote desativado");
        Ok(())
    }

    /// Reescreve o par (disponível, reservada) de um lote divergente,
    /// registrando a diferença como movimentação de ajuste. Recusa aplicar
    /// se o lote mudou desde a avaliação; a próxima execução o reavalia.
    pub(crate) async fn apply_correction(
        &self,
        tenant_id: Uuid,
        finding: &Discrepancy,
        actor_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_apply_correction(tenant_id, finding, actor_id).await {
                Ok(applied) => return Ok(applied),
                Err(err) if should_retry(&err, attempt) => {
                    sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(surface_conflict(err)),
            }
        }
    }

    async fn try_apply_correction(
        &self,
        tenant_id: Uuid,
        finding: &Discrepancy,
        actor_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut item = self
            .inventory_repo
            .get_item_for_update(&mut *tx, tenant_id, finding.inventory_item_id)
            .await?;

        // Compara com o estado visto na avaliação: se o lote já mudou,
        // a divergência pode não existir mais.
        if item.available_quantity != finding.stored_available
            || item.reserved_quantity != finding.stored_reserved
        {
            tracing::warn!(
                item_id = %item.id,
                "Lote alterado desde a avaliação; correção adiada"
            );
            return Ok(false);
        }

        let previous_available = item.available_quantity;
        item.apply_correction(finding.expected_available, finding.expected_reserved)?;

        self.inventory_repo.update_quantities(&mut *tx, &item).await?;
        self.inventory_repo
            .record_movement(
                &mut *tx,
                tenant_id,
                item.id,
                MovementKind::Adjustment,
                item.available_quantity - previous_available,
                previous_available,
                item.available_quantity,
                "Correção de reconciliação",
                actor_id,
                None,
            )
            .await?;

        tx.commit().await?;
        tracing::info!(
            item_id = %item.id,
            available = item.available_quantity,
            reserved = item.reserved_quantity,
            "Divergência corrigida"
        );
        Ok(true)
    }
}
