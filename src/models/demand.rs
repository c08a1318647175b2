// src/models/demand.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Status da solicitação ---
//
// Máquina de estados: PENDING -> COMMITTED -> FULFILLED, com as saídas
// terminais PENDING -> REJECTED e COMMITTED -> CANCELLED. A solicitação só
// segura reserva de estoque enquanto está em COMMITTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "demand_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemandStatus {
    Pending,
    Committed,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl DemandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemandStatus::Pending => "PENDING",
            DemandStatus::Committed => "COMMITTED",
            DemandStatus::Fulfilled => "FULFILLED",
            DemandStatus::Rejected => "REJECTED",
            DemandStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DemandStatus::Fulfilled | DemandStatus::Rejected | DemandStatus::Cancelled
        )
    }

    /// A solicitação segura reserva exatamente enquanto está em COMMITTED.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, DemandStatus::Committed)
    }

    /// Valida uma transição; fora de ordem vira erro de estado, nunca
    /// coerção silenciosa.
    pub fn ensure_transition(from: DemandStatus, to: DemandStatus) -> Result<(), AppError> {
        let allowed = matches!(
            (from, to),
            (DemandStatus::Pending, DemandStatus::Committed)
                | (DemandStatus::Pending, DemandStatus::Rejected)
                | (DemandStatus::Committed, DemandStatus::Fulfilled)
                | (DemandStatus::Committed, DemandStatus::Cancelled)
        );
        if allowed {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

// --- 2. Registro de solicitação ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemandRecord {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub requester_id: Uuid,
    /// Código externo do sujeito (ex.: paciente), quando houver.
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub status: DemandStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub committed_by: Option<Uuid>,
    pub committed_at: Option<DateTime<Utc>>,
    pub fulfilled_by: Option<Uuid>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Item da solicitação, com snapshot do produto no momento da criação (o
/// registro continua legível depois que o lote for desativado).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemandLineItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub demand_id: Uuid,
    pub inventory_item_id: Uuid,
    pub product_code: String,
    pub display_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub position: i32,
}

/// Solicitação completa (registro + itens), como os handlers devolvem.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemandWithLines {
    #[serde(flatten)]
    pub record: DemandRecord,
    pub line_items: Vec<DemandLineItem>,
}

// --- 3. Agregação de quantidades ---

/// Soma as quantidades por item de inventário, preservando a ordem da
/// primeira ocorrência. Duas linhas do mesmo lote contam como a soma — a
/// "pegada" de reserva da solicitação é um multiconjunto.
pub fn aggregate_quantities(lines: &[DemandLineItem]) -> Vec<(Uuid, i64)> {
    let mut totals: Vec<(Uuid, i64)> = Vec::new();
    for line in lines {
        match totals
            .iter_mut()
            .find(|(id, _)| *id == line.inventory_item_id)
        {
            Some((_, qty)) => *qty += line.quantity,
            None => totals.push((line.inventory_item_id, line.quantity)),
        }
    }
    totals
}

// --- 4. Estatísticas de solicitações ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemandStats {
    pub total: i64,
    pub pending: i64,
    pub committed: i64,
    pub fulfilled: i64,
    pub rejected: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        DemandStatus::ensure_transition(DemandStatus::Pending, DemandStatus::Committed).unwrap();
        DemandStatus::ensure_transition(DemandStatus::Committed, DemandStatus::Fulfilled).unwrap();
        DemandStatus::ensure_transition(DemandStatus::Pending, DemandStatus::Rejected).unwrap();
        DemandStatus::ensure_transition(DemandStatus::Committed, DemandStatus::Cancelled).unwrap();
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        // atender sem commit
        assert!(matches!(
            DemandStatus::ensure_transition(DemandStatus::Pending, DemandStatus::Fulfilled),
            Err(AppError::InvalidTransition { .. })
        ));
        // cancelar pendente (só rejeição)
        assert!(matches!(
            DemandStatus::ensure_transition(DemandStatus::Pending, DemandStatus::Cancelled),
            Err(AppError::InvalidTransition { .. })
        ));
        // estados terminais são imutáveis
        for terminal in [
            DemandStatus::Fulfilled,
            DemandStatus::Rejected,
            DemandStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            assert!(
                DemandStatus::ensure_transition(terminal, DemandStatus::Committed).is_err()
            );
        }
    }

    #[test]
    fn only_committed_holds_reservation() {
        assert!(DemandStatus::Committed.holds_reservation());
        for s in [
            DemandStatus::Pending,
            DemandStatus::Fulfilled,
            DemandStatus::Rejected,
            DemandStatus::Cancelled,
        ] {
            assert!(!s.holds_reservation());
        }
    }

    #[test]
    fn aggregation_sums_repeated_items_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let line = |item: Uuid, qty: i64, pos: i32| DemandLineItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            demand_id: Uuid::nil(),
            inventory_item_id: item,
            product_code: "P".into(),
            display_name: "Produto".into(),
            quantity: qty,
            unit_price: Decimal::ZERO,
            position: pos,
        };
        let totals = aggregate_quantities(&[line(a, 2, 0), line(b, 1, 1), line(a, 3, 2)]);
        assert_eq!(totals, vec![(a, 5), (b, 1)]);
    }
}
