// src/models/reconciliation.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::inventory::InventoryItem;

// A auditoria recomputa a reserva esperada de cada lote a partir das
// solicitações COMMITTED (a fonte de verdade da demanda) e compara com o que
// está gravado. A derivação é pura; o serviço só carrega dados e aplica.

/// Divergência encontrada em um lote, com antes/depois e deltas com sinal.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub inventory_item_id: Uuid,
    pub product_code: String,
    pub lot: String,
    pub display_name: String,
    pub initial_quantity: i64,
    pub stored_available: i64,
    pub stored_reserved: i64,
    pub expected_available: i64,
    pub expected_reserved: i64,
    pub available_delta: i64,
    pub reserved_delta: i64,
    /// Sobre-compromisso: a demanda ativa excede a base do lote. Nunca é
    /// corrigido automaticamente; exige intervenção.
    pub critical: bool,
}

/// Relatório estruturado de uma execução — a trilha de auditoria de que a
/// reconciliação aconteceu e do que mudou.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub dry_run: bool,
    pub items_checked: usize,
    pub committed_demands: usize,
    pub discrepant: usize,
    pub corrected: usize,
    pub critical: usize,
    pub findings: Vec<Discrepancy>,
    pub executed_at: DateTime<Utc>,
}

/// Reserva esperada por lote: soma das quantidades dos itens de todas as
/// solicitações atualmente COMMITTED.
pub fn expected_reservations(
    committed_lines: impl IntoIterator<Item = (Uuid, i64)>,
) -> HashMap<Uuid, i64> {
    let mut expected: HashMap<Uuid, i64> = HashMap::new();
    for (item_id, quantity) in committed_lines {
        *expected.entry(item_id).or_insert(0) += quantity;
    }
    expected
}

/// Compara um lote com a derivação. `None` = consistente.
pub fn evaluate_item(item: &InventoryItem, expected_reserved: i64) -> Option<Discrepancy> {
    // disponível esperado = base - reserva esperada; negativo indica
    // sobre-compromisso e é sinalizado, não silenciosamente truncado.
    let raw_available = item.initial_quantity - expected_reserved;
    let critical = raw_available < 0;
    let expected_available = raw_available.max(0);

    let consistent = !critical
        && item.reserved_quantity == expected_reserved
        && item.available_quantity == expected_available;
    if consistent {
        return None;
    }

    Some(Discrepancy {
        inventory_item_id: item.id,
        product_code: item.product_code.clone(),
        lot: item.lot.clone(),
        display_name: item.display_name.clone(),
        initial_quantity: item.initial_quantity,
        stored_available: item.available_quantity,
        stored_reserved: item.reserved_quantity,
        expected_available,
        expected_reserved,
        available_delta: expected_available - item.available_quantity,
        reserved_delta: expected_reserved - item.reserved_quantity,
        critical,
    })
}

/// Avalia todos os lotes ativos de um tenant contra a demanda derivada.
pub fn evaluate_items(
    items: &[InventoryItem],
    expected: &HashMap<Uuid, i64>,
) -> Vec<Discrepancy> {
    items
        .iter()
        .filter_map(|item| {
            let expected_reserved = expected.get(&item.id).copied().unwrap_or(0);
            evaluate_item(item, expected_reserved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

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
            unit_price: Decimal::ZERO,
            expiration_date: None,
            entry_date: Utc::now().date_naive(),
            active: true,
            deactivated_by: None,
            deactivated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn consistent_item_produces_no_finding() {
        let it = item(10, 6, 4);
        assert!(evaluate_item(&it, 4).is_none());
    }

    #[test]
    fn drifted_reservation_is_reported_with_deltas() {
        // LOT-A gravado (incorretamente) com reserved=0 enquanto uma
        // solicitação COMMITTED de 4 unidades ainda existe.
        let it = item(10, 10, 0);
        let d = evaluate_item(&it, 4).expect("deveria divergir");
        assert_eq!(d.expected_reserved, 4);
        assert_eq!(d.stored_reserved, 0);
        assert_eq!(d.expected_available, 6);
        assert_eq!(d.available_delta, -4);
        assert_eq!(d.reserved_delta, 4);
        assert!(!d.critical);
    }

    #[test]
    fn over_commitment_is_critical_not_clamped_away() {
        let it = item(10, 0, 10);
        let d = evaluate_item(&it, 14).expect("deveria divergir");
        assert!(d.critical);
        // o valor reportado é o truncado, mas a flag preserva o sinal
        assert_eq!(d.expected_available, 0);
    }

    #[test]
    fn applying_corrections_converges_in_one_pass() {
        // Idempotência: corrigir e reavaliar com a mesma demanda não pode
        // encontrar nada na segunda passada.
        let mut items = vec![item(10, 10, 0), item(8, 3, 5), item(20, 12, 8)];
        let lines: Vec<(Uuid, i64)> = vec![
            (items[0].id, 4),
            (items[1].id, 5),
            (items[2].id, 2),
            (items[2].id, 4),
        ];
        let expected = expected_reservations(lines);

        let findings = evaluate_items(&items, &expected);
        assert_eq!(findings.len(), 2); // itens 0 e 2 divergem

        for d in &findings {
            let it = items
                .iter_mut()
                .find(|i| i.id == d.inventory_item_id)
                .unwrap();
            it.apply_correction(d.expected_available, d.expected_reserved)
                .unwrap();
        }

        assert!(evaluate_items(&items, &expected).is_empty());
    }

    #[test]
    fn expected_reservations_ignores_unreferenced_items() {
        let expected = expected_reservations(Vec::new());
        let it = item(10, 10, 0);
        assert!(evaluate_item(&it, *expected.get(&it.id).unwrap_or(&0)).is_none());
    }
}
