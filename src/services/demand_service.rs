// src/services/demand_service.rs

use sqlx::PgPool;
use tokio::time::sleep;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{backoff_delay, should_retry, surface_conflict},
        error::AppError,
    },
    db::{
        demand_repo::{ListDemandsFilter, NewDemand, NewDemandLine},
        DemandRepository, InventoryRepository,
    },
    models::{
        demand::{DemandStats, DemandStatus, DemandWithLines},
        inventory::MovementKind,
    },
    services::reservation_service::ReservationService,
};

/// Entrada de uma linha na criação de solicitação.
#[derive(Debug, Clone)]
pub struct DemandLineInput {
    pub inventory_item_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateDemandInput {
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<DemandLineInput>,
}

/// Ação de transição sobre uma solicitação. O alvo é derivado da ação; o
/// estado de origem é validado dentro da transação que segura o registro.
#[derive(Debug, Clone)]
pub enum DemandAction {
    Commit,
    Reject { reason: String },
    Cancel,
    Fulfill,
}

impl DemandAction {
    fn target(&self) -> DemandStatus {
        match self {
            DemandAction::Commit => DemandStatus::Committed,
            DemandAction::Reject { .. } => DemandStatus::Rejected,
            DemandAction::Cancel => DemandStatus::Cancelled,
            DemandAction::Fulfill => DemandStatus::Fulfilled,
        }
    }
}

/// Ciclo de vida das solicitações. As transições que tocam estoque
/// (compromisso, cancelamento, atendimento) mudam status e quantidades na
/// mesma transação: nunca há solicitação COMMITTED sem a reserva
/// correspondente, nem reserva órfã de solicitação terminal.
#[derive(Clone)]
pub struct DemandService {
    pool: PgPool,
    demand_repo: DemandRepository,
    inventory_repo: InventoryRepository,
    reservation: ReservationService,
}

impl DemandService {
    pub fn new(
        pool: PgPool,
        demand_repo: DemandRepository,
        inventory_repo: InventoryRepository,
        reservation: ReservationService,
    ) -> Self {
        Self {
            pool,
            demand_repo,
            inventory_repo,
            reservation,
        }
    }

    // ---
    // Leituras
    // ---

    pub async fn get_with_lines(
        &self,
        tenant_id: Uuid,
        demand_id: Uuid,
    ) -> Result<DemandWithLines, AppError> {
        let record = self.demand_repo.get_record(tenant_id, demand_id).await?;
        let line_items = self
            .demand_repo
            .get_lines(&self.pool, tenant_id, demand_id)
            .await?;
        Ok(DemandWithLines { record, line_items })
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: &ListDemandsFilter,
    ) -> Result<Vec<DemandWithLines>, AppError> {
        let records = self.demand_repo.list_records(tenant_id, filter).await?;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let line_items = self
                .demand_repo
                .get_lines(&self.pool, tenant_id, record.id)
                .await?;
            out.push(DemandWithLines { record, line_items });
        }
        Ok(out)
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<DemandStats, AppError> {
        self.demand_repo.stats(tenant_id).await
    }

    // ---
    // Criação
    // ---

    /// Registra a solicitação em PENDING. A checagem de saldo aqui é
    /// consultiva (feedback imediato ao solicitante); a reserva de fato só
    /// acontece no compromisso, sob lock.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        requester_id: Uuid,
        input: CreateDemandInput,
    ) -> Result<DemandWithLines, AppError> {
        if input.lines.is_empty() {
            return Err(AppError::InvalidLineItem(
                "A solicitação precisa de ao menos uma linha".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Snapshot do produto em cada linha, validando existência e saldo.
        let mut new_lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            if line.quantity <= 0 {
                return Err(AppError::InvalidLineItem(
                    "A quantidade da linha deve ser positiva".to_string(),
                ));
            }
            let item = self
                .inventory_repo
                .get_item(tenant_id, line.inventory_item_id)
                .await
                .map_err(|err| match err {
                    AppError::ItemNotFound => AppError::InvalidLineItem(format!(
                        "Linha referencia lote inexistente: {}",
                        line.inventory_item_id
                    )),
                    other => other,
                })?;
            if !item.active {
                return Err(AppError::InvalidLineItem(format!(
                    "O lote {} está desativado",
                    item.lot
                )));
            }
            if item.available_quantity < line.quantity {
                return Err(AppError::InsufficientStock {
                    item_id: item.id,
                    requested: line.quantity,
                    available: item.available_quantity,
                });
            }
            new_lines.push(NewDemandLine {
                inventory_item_id: item.id,
                product_code: item.product_code,
                display_name: item.display_name,
                quantity: line.quantity,
                unit_price: item.unit_price,
            });
        }

        let new_demand = NewDemand {
            requester_id,
            subject_id: input.subject_id,
            subject_name: input.subject_name,
            notes: input.notes,
        };
        let record = self
            .demand_repo
            .create_record(&mut *tx, tenant_id, &new_demand)
            .await?;

        let mut line_items = Vec::with_capacity(new_lines.len());
        for (position, line) in new_lines.iter().enumerate() {
            let inserted = self
                .demand_repo
                .insert_line(&mut *tx, tenant_id, record.id, line, position as i32)
                .await?;
            line_items.push(inserted);
        }

        tx.commit().await?;
        tracing::info!(demand_id = %record.id, lines = line_items.len(), "Solicitação criada");
        Ok(DemandWithLines { record, line_items })
    }

    // ---
    // Transições
    // ---

    pub async fn transition(
        &self,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
        action: DemandAction,
    ) -> Result<DemandWithLines, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_transition(tenant_id, demand_id, actor_id, &action)
                .await
            {
                Ok(demand) => return Ok(demand),
                Err(err) if should_retry(&err, attempt) => {
                    tracing::warn!(
                        %demand_id,
                        attempt,
                        "Conflito de transação na transição; repetindo"
                    );
                    sleep(backoff_delay(attempt)).await;
                }
                Err(err) => return Err(surface_conflict(err)),
            }
        }
    }

    async fn try_transition(
        &self,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
        action: &DemandAction,
    ) -> Result<DemandWithLines, AppError> {
        let mut tx = self.pool.begin().await?;

        let record = self
            .demand_repo
            .get_record_for_update(&mut *tx, tenant_id, demand_id)
            .await?;
        DemandStatus::ensure_transition(record.status, action.target())?;

        let line_items = self
            .demand_repo
            .get_lines(&mut *tx, tenant_id, demand_id)
            .await?;

        let updated = match action {
            DemandAction::Commit => {
                self.reservation
                    .reserve(&mut tx, tenant_id, &line_items)
                    .await?;
                self.demand_repo
                    .mark_committed(&mut *tx, tenant_id, demand_id, actor_id)
                    .await?
            }

            DemandAction::Reject { reason } => {
                self.demand_repo
                    .mark_rejected(&mut *tx, tenant_id, demand_id, actor_id, reason)
                    .await?
            }

            DemandAction::Cancel => {
                self.reservation
                    .release(&mut tx, tenant_id, &record, &line_items)
                    .await?;
                self.demand_repo
                    .mark_cancelled(&mut *tx, tenant_id, demand_id, actor_id)
                    .await?
            }

            DemandAction::Fulfill => {
                let items = self
                    .reservation
                    .consume(&mut tx, tenant_id, &line_items)
                    .await?;

                // Uma linha de saída por item da solicitação. O disponível
                // não muda no atendimento (a reserva já o debitou no
                // compromisso), então antes = depois.
                for line in &line_items {
                    let available = items
                        .get(&line.inventory_item_id)
                        .map(|item| item.available_quantity)
                        .ok_or_else(|| {
                            AppError::InvariantViolation(format!(
                                "Lote {} ausente do consumo da solicitação {}",
                                line.inventory_item_id, demand_id
                            ))
                        })?;
                    self.inventory_repo
                        .record_movement(
                            &mut *tx,
                            tenant_id,
                            line.inventory_item_id,
                            MovementKind::Exit,
                            -line.quantity,
                            available,
                            available,
                            "Atendimento da solicitação",
                            actor_id,
                            Some(demand_id),
                        )
                        .await?;
                }

                self.demand_repo
                    .mark_fulfilled(&mut *tx, tenant_id, demand_id, actor_id)
                    .await?
            }
        };

        tx.commit().await?;
        tracing::info!(
            %demand_id,
            status = updated.status.as_str(),
            "Transição de solicitação aplicada"
        );
        Ok(DemandWithLines {
            record: updated,
            line_items,
        })
    }
}
