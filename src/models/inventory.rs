// src/models/inventory.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Item de Inventário (um registro por tenant + produto + lote) ---
//
// `initial_quantity` é a base contábil do lote: o total fisicamente em mãos
// (livre + reservado). Entradas somam nela; saídas (consumo) subtraem dela.
// O balanço (inicial = disponível + reservada) vale após toda operação
// bem-sucedida, e é também imposta por CHECK no banco.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "REN-TOX-100U")]
    pub product_code: String,
    #[schema(example = "LOT-A")]
    pub lot: String,
    pub display_name: String,
    pub initial_quantity: i64,
    pub available_quantity: i64,
    pub reserved_quantity: i64,
    #[schema(example = "125.50")]
    pub unit_price: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub entry_date: NaiveDate,
    pub active: bool,
    pub deactivated_by: Option<Uuid>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Re-checagem do balanço e da não-negatividade antes de persistir qualquer
    /// mutação. Falha aqui significa bug na contabilidade, nunca erro de
    /// negócio.
    pub fn assert_invariants(&self) -> Result<(), AppError> {
        if self.available_quantity < 0 || self.reserved_quantity < 0 {
            return Err(AppError::InvariantViolation(format!(
                "lote {} ({}): quantidade negativa (disponível={}, reservada={})",
                self.lot, self.id, self.available_quantity, self.reserved_quantity
            )));
        }
        if self.initial_quantity != self.available_quantity + self.reserved_quantity {
            return Err(AppError::InvariantViolation(format!(
                "lote {} ({}): inicial={} != disponível={} + reservada={}",
                self.lot,
                self.id,
                self.initial_quantity,
                self.available_quantity,
                self.reserved_quantity
            )));
        }
        Ok(())
    }

    /// ENTRADA: reposição do lote. Soma na base e no disponível.
    pub fn enter(&mut self, quantity: i64) -> Result<(), AppError> {
        self.initial_quantity += quantity;
        self.available_quantity += quantity;
        self.assert_invariants()
    }

    /// SAÍDA direta (sem reserva prévia): baixa do disponível e da base.
    pub fn withdraw(&mut self, quantity: i64) -> Result<(), AppError> {
        if self.available_quantity < quantity {
            return Err(AppError::InsufficientStock {
                item_id: self.id,
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.available_quantity -= quantity;
        self.initial_quantity -= quantity;
        self.assert_invariants()
    }

    /// Move quantidade de disponível para reservada (commit da solicitação).
    pub fn reserve(&mut self, quantity: i64) -> Result<(), AppError> {
        if self.available_quantity < quantity {
            return Err(AppError::InsufficientStock {
                item_id: self.id,
                requested: quantity,
                available: self.available_quantity,
            });
        }
        self.available_quantity -= quantity;
        self.reserved_quantity += quantity;
        self.assert_invariants()
    }

    /// Devolve quantidade reservada para disponível (cancelamento).
    /// Reserva menor que o pedido indica drift já em curso: devolvemos o que
    /// existe e deixamos o restante para a reconciliação.
    pub fn release(&mut self, quantity: i64) -> Result<(), AppError> {
        let releasable = quantity.min(self.reserved_quantity);
        if releasable < quantity {
            tracing::warn!(
                item_id = %self.id,
                lot = %self.lot,
                requested = quantity,
                reserved = self.reserved_quantity,
                "liberação maior que a reserva registrada; devolvendo apenas o reservado"
            );
        }
        self.reserved_quantity -= releasable;
        self.available_quantity += releasable;
        self.assert_invariants()
    }

    /// SAÍDA de atendimento: consome quantidade já reservada. O disponível
    /// não muda porque o commit já o reduziu; baixamos reserva e base.
    pub fn consume_reserved(&mut self, quantity: i64) -> Result<(), AppError> {
        if self.reserved_quantity < quantity {
            // Se o commit teve sucesso isso é impossível sem corrupção
            // externa; sinal de inconsistência, não erro de negócio.
            return Err(AppError::InvariantViolation(format!(
                "lote {} ({}): atendimento de {} unidades com apenas {} reservadas",
                self.lot, self.id, quantity, self.reserved_quantity
            )));
        }
        self.reserved_quantity -= quantity;
        self.initial_quantity -= quantity;
        self.assert_invariants()
    }

    /// CORREÇÃO: grava o par disponível/reservada calculado pela auditoria.
    /// Restrito a chamadores internos (serviço de reconciliação).
    pub fn apply_correction(&mut self, available: i64, reserved: i64) -> Result<(), AppError> {
        self.available_quantity = available;
        self.reserved_quantity = reserved;
        self.assert_invariants()
    }

    /// Desativação lógica, com carimbo de quem desativou. Recusada enquanto
    /// houver reserva pendente: solicitações COMMITTED ainda vão consumir
    /// deste lote.
    pub fn deactivate(&mut self, actor_id: Uuid) -> Result<(), AppError> {
        if self.reserved_quantity > 0 {
            return Err(AppError::ItemHasActiveReservation(self.reserved_quantity));
        }
        self.active = false;
        self.deactivated_by = Some(actor_id);
        self.deactivated_at = Some(Utc::now());
        Ok(())
    }
}

// --- 2. Movimentações (livro-razão, append-only) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "movement_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Entry,
    Exit,
    Adjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub inventory_item_id: Uuid,
    pub kind: MovementKind,
    /// Delta com sinal: positivo nas entradas, negativo nas saídas;
    /// nos ajustes, a diferença aplicada sobre o disponível.
    pub quantity: i64,
    pub previous_available: i64,
    pub new_available: i64,
    pub reason: String,
    pub performed_by: Uuid,
    pub performed_at: DateTime<Utc>,
    pub demand_record_id: Option<Uuid>,
}

// --- 3. Estatísticas do inventário (dashboard) ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_units: i64,
    #[schema(example = "10432.75")]
    pub total_value: Decimal,
    pub expired_lots: i64,
    pub expiring_30_days: i64,
    pub low_stock_lots: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(initial: i64, available: i64, reserved: i64) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            product_code: "REN-TOX-100U".into(),
            lot: "LOT-A".into(),
            display_name: "Toxina 100U".into(),
            initial_quantity: initial,
            available_quantity: available,
            reserved_quantity: reserved,
            unit_price: Decimal::new(12550, 2),
            expiration_date: None,
            entry_date: chrono::Utc::now().date_naive(),
            active: true,
            deactivated_by: None,
            deactivated_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn assert_balance(it: &InventoryItem) {
        assert_eq!(
            it.initial_quantity,
            it.available_quantity + it.reserved_quantity
        );
        assert!(it.available_quantity >= 0);
        assert!(it.reserved_quantity >= 0);
    }

    #[test]
    fn lot_lifecycle_keeps_invariant() {
        // Cenário do LOT-A: criado com 10, reserva 4, atende 4.
        let mut it = item(10, 10, 0);

        it.reserve(4).unwrap();
        assert_eq!(it.available_quantity, 6);
        assert_eq!(it.reserved_quantity, 4);
        assert_balance(&it);

        // Atendimento: disponível não muda, reserva e base caem.
        it.consume_reserved(4).unwrap();
        assert_eq!(it.available_quantity, 6);
        assert_eq!(it.reserved_quantity, 0);
        assert_eq!(it.initial_quantity, 6);
        assert_balance(&it);
    }

    #[test]
    fn every_operation_preserves_invariant() {
        let mut it = item(10, 10, 0);
        it.enter(5).unwrap();
        assert_balance(&it);
        it.reserve(7).unwrap();
        assert_balance(&it);
        it.release(3).unwrap();
        assert_balance(&it);
        it.withdraw(2).unwrap();
        assert_balance(&it);
        it.consume_reserved(4).unwrap();
        assert_balance(&it);
        assert_eq!(it.initial_quantity, 9);
        assert_eq!(it.available_quantity, 9);
        assert_eq!(it.reserved_quantity, 0);
    }

    #[test]
    fn reserve_beyond_available_fails_and_leaves_item_unchanged() {
        let mut it = item(10, 6, 4);
        let err = it.reserve(8).unwrap_err();
        match err {
            AppError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 8);
                assert_eq!(available, 6);
            }
            other => panic!("erro inesperado: {other}"),
        }
        assert_eq!(it.available_quantity, 6);
        assert_eq!(it.reserved_quantity, 4);
        assert_balance(&it);
    }

    #[test]
    fn withdraw_beyond_available_fails() {
        let mut it = item(5, 5, 0);
        assert!(matches!(
            it.withdraw(6),
            Err(AppError::InsufficientStock { .. })
        ));
        assert_eq!(it.available_quantity, 5);
    }

    #[test]
    fn consume_without_reservation_is_invariant_violation() {
        let mut it = item(10, 10, 0);
        assert!(matches!(
            it.consume_reserved(1),
            Err(AppError::InvariantViolation(_))
        ));
    }

    #[test]
    fn release_clamps_to_recorded_reservation() {
        let mut it = item(10, 8, 2);
        it.release(5).unwrap();
        // devolve só as 2 reservadas; o balanço permanece válido
        assert_eq!(it.reserved_quantity, 0);
        assert_eq!(it.available_quantity, 10);
        assert_balance(&it);
    }

    #[test]
    fn correction_rewrites_pair_under_invariant() {
        let mut it = item(10, 10, 0);
        it.apply_correction(6, 4).unwrap();
        assert_eq!(it.available_quantity, 6);
        assert_eq!(it.reserved_quantity, 4);
        assert_balance(&it);

        // correção que quebraria o balanço é recusada
        assert!(matches!(
            it.apply_correction(9, 4),
            Err(AppError::InvariantViolation(_))
        ));
    }

    #[test]
    fn deactivation_stamps_actor_and_refuses_reserved_lot() {
        let actor = Uuid::new_v4();

        // com reserva pendente, a desativação é recusada e nada muda
        let mut reserved = item(10, 6, 4);
        assert!(matches!(
            reserved.deactivate(actor),
            Err(AppError::ItemHasActiveReservation(4))
        ));
        assert!(reserved.active);
        assert!(reserved.deactivated_by.is_none());

        // sem reserva, desativa e registra quem desativou
        let mut free = item(10, 10, 0);
        free.deactivate(actor).unwrap();
        assert!(!free.active);
        assert_eq!(free.deactivated_by, Some(actor));
        assert!(free.deactivated_at.is_some());
    }
}
