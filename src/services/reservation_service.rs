// src/services/reservation_service.rs

use std::collections::BTreeMap;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InventoryRepository,
    models::{
        demand::{aggregate_quantities, DemandLineItem, DemandRecord},
        inventory::InventoryItem,
    },
};

/// Gerencia a parcela reservada dos lotes. Toda mutação de reserva passa
/// por aqui, sempre dentro de uma transação aberta pelo chamador: o
/// conjunto de itens de uma solicitação é reservado, liberado ou
/// consumido por inteiro, nunca parcialmente.
#[derive(Clone)]
pub struct ReservationService {
    inventory_repo: InventoryRepository,
}

impl ReservationService {
    pub fn new(inventory_repo: InventoryRepository) -> Self {
        Self { inventory_repo }
    }

    /// Reserva as quantidades de todas as linhas. Falha sem alterar nada
    /// se qualquer lote estiver inativo, ausente ou sem saldo disponível.
    pub async fn reserve(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        lines: &[DemandLineItem],
    ) -> Result<Vec<InventoryItem>, AppError> {
        let totals = aggregate_quantities(lines);
        let mut items = self.lock_items(&mut *conn, tenant_id, &totals).await?;
        apply_reservation(&mut items, &totals)?;
        self.persist(&mut *conn, &items).await
    }

    /// Devolve ao saldo disponível as quantidades reservadas pelo registro.
    /// Idempotente: se o registro não estiver em um status que segura
    /// reserva, nada é debitado (proteção contra corrida de dupla liberação).
    pub async fn release(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        record: &DemandRecord,
        lines: &[DemandLineItem],
    ) -> Result<bool, AppError> {
        if !record.status.holds_reservation() {
            tracing::warn!(
                demand_id = %record.id,
                status = record.status.as_str(),
                "Liberação ignorada: o registro não segura reserva"
            );
            return Ok(false);
        }

        let totals = aggregate_quantities(lines);
        let mut items = self.lock_items(&mut *conn, tenant_id, &totals).await?;
        apply_release(&mut items, &totals)?;
        self.persist(&mut *conn, &items).await?;
        Ok(true)
    }

    /// Consome a reserva no atendimento: baixa reservada e a base do lote,
    /// sem tocar o disponível. Reserva insuficiente aqui é corrupção de
    /// estado, não erro de negócio.
    pub async fn consume(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        lines: &[DemandLineItem],
    ) -> Result<BTreeMap<Uuid, InventoryItem>, AppError> {
        let totals = aggregate_quantities(lines);
        let mut items = self.lock_items(&mut *conn, tenant_id, &totals).await?;
        apply_consumption(&mut items, &totals)?;
        self.persist(&mut *conn, &items).await?;
        Ok(items)
    }

    /// Trava os lotes referenciados em ordem ascendente de id (a ordem fixa
    /// evita deadlock entre transações concorrentes).
    async fn lock_items(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        totals: &[(Uuid, i64)],
    ) -> Result<BTreeMap<Uuid, InventoryItem>, AppError> {
        let ids: Vec<Uuid> = totals.iter().map(|(id, _)| *id).collect();
        let rows = self
            .inventory_repo
            .get_items_for_update(&mut *conn, tenant_id, &ids)
            .await?;

        if rows.len() != ids.len() {
            return Err(AppError::InvalidLineItem(
                "Uma ou mais linhas referenciam lotes inexistentes".to_string(),
            ));
        }

        Ok(rows.into_iter().map(|item| (item.id, item)).collect())
    }

    async fn persist(
        &self,
        conn: &mut PgConnection,
        items: &BTreeMap<Uuid, InventoryItem>,
    ) -> Result<Vec<InventoryItem>, AppError> {
        for item in items.values() {
            self.inventory_repo
                .update_quantities(&mut *conn, item)
                .await?;
        }
        Ok(items.values().cloned().collect())
    }
}

// --- Aplicação pura (valida tudo, depois aplica tudo) ---

pub(crate) fn apply_reservation(
    items: &mut BTreeMap<Uuid, InventoryItem>,
    totals: &[(Uuid, i64)],
) -> Result<(), AppError> {
    for (item_id, quantity) in totals {
        let item = lookup(items, item_id)?;
        if !item.active {
            return Err(AppError::InvalidLineItem(format!(
                "O lote {} está desativado",
                item.lot
            )));
        }
        if item.available_quantity < *quantity {
            return Err(AppError::InsufficientStock {
                item_id: *item_id,
                requested: *quantity,
                available: item.available_quantity,
            });
        }
    }

    for (item_id, quantity) in totals {
        lookup_mut(items, item_id)?.reserve(*quantity)?;
    }
    Ok(())
}

pub(crate) fn apply_release(
    items: &mut BTreeMap<Uuid, InventoryItem>,
    totals: &[(Uuid, i64)],
) -> Result<(), AppError> {
    for (item_id, quantity) in totals {
        lookup_mut(items, item_id)?.release(*quantity)?;
    }
    Ok(())
}

pub(crate) fn apply_consumption(
    items: &mut BTreeMap<Uuid, InventoryItem>,
    totals: &[(Uuid, i64)],
) -> Result<(), AppError> {
    for (item_id, quantity) in totals {
        let item = lookup(items, item_id)?;
        if item.reserved_quantity < *quantity {
            return Err(AppError::InvariantViolation(format!(
                "Lote {} tem reserva {} menor que o consumo solicitado {}",
                item.id, item.reserved_quantity, quantity
            )));
        }
    }

    for (item_id, quantity) in totals {
        lookup_mut(items, item_id)?.consume_reserved(*quantity)?;
    }
    Ok(())
}

fn lookup<'a>(
    items: &'a BTreeMap<Uuid, InventoryItem>,
    item_id: &Uuid,
) -> Result<&'a InventoryItem, AppError> {
    items.get(item_id).ok_or_else(|| {
        AppError::InvalidLineItem(format!("Linha referencia lote desconhecido: {item_id}"))
    })
}

fn lookup_mut<'a>(
    items: &'a mut BTreeMap<Uuid, InventoryItem>,
    item_id: &Uuid,
) -> Result<&'a mut InventoryItem, AppError> {
    items.get_mut(item_id).ok_or_else(|| {
        AppError::InvalidLineItem(format!("Linha referencia lote desconhecido: {item_id}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn item(id: u128, initial: i64, available: i64, reserved: i64) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: Uuid::from_u128(id),
            tenant_id: Uuid::from_u128(999),
            product_code: format!("PROD-{id}"),
            lot: format!("LOTE-{id}"),
            display_name: format!("Produto {id}"),
            initial_quantity: initial,
            available_quantity: available,
            reserved_quantity: reserved,
            unit_price: Decimal::new(1050, 2),
            expiration_date: None,
            entry_date: now.date_naive(),
            active: true,
            deactivated_by: None,
            deactivated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn items_map(items: Vec<InventoryItem>) -> BTreeMap<Uuid, InventoryItem> {
        items.into_iter().map(|i| (i.id, i)).collect()
    }

    #[test]
    fn reservation_is_all_or_nothing() {
        let mut items = items_map(vec![item(1, 10, 10, 0), item(2, 5, 2, 3)]);
        let snapshot = items.clone();
        let totals = vec![(Uuid::from_u128(1), 4), (Uuid::from_u128(2), 3)];

        let err = apply_reservation(&mut items, &totals).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        // O primeiro lote tinha saldo de sobra, mas nada pode ter mudado.
        assert_eq!(items, snapshot);
    }

    #[test]
    fn reservation_applies_to_every_line() {
        let mut items = items_map(vec![item(1, 10, 10, 0), item(2, 8, 8, 0)]);
        let totals = vec![(Uuid::from_u128(1), 4), (Uuid::from_u128(2), 8)];

        apply_reservation(&mut items, &totals).unwrap();

        let a = &items[&Uuid::from_u128(1)];
        assert_eq!((a.available_quantity, a.reserved_quantity), (6, 4));
        let b = &items[&Uuid::from_u128(2)];
        assert_eq!((b.available_quantity, b.reserved_quantity), (0, 8));
    }

    #[test]
    fn inactive_lot_blocks_the_whole_reservation() {
        let mut deactivated = item(2, 5, 5, 0);
        deactivated.active = false;
        let mut items = items_map(vec![item(1, 10, 10, 0), deactivated]);
        let snapshot = items.clone();
        let totals = vec![(Uuid::from_u128(1), 1), (Uuid::from_u128(2), 1)];

        let err = apply_reservation(&mut items, &totals).unwrap_err();
        assert!(matches!(err, AppError::InvalidLineItem(_)));
        assert_eq!(items, snapshot);
    }

    #[test]
    fn consumption_failure_leaves_earlier_lines_untouched() {
        // A última linha tem reserva insuficiente: consumo não pode ser
        // aplicado parcialmente às linhas anteriores.
        let mut items = items_map(vec![item(1, 10, 6, 4), item(2, 8, 8, 0)]);
        let snapshot = items.clone();
        let totals = vec![(Uuid::from_u128(1), 4), (Uuid::from_u128(2), 2)];

        let err = apply_consumption(&mut items, &totals).unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)));
        assert_eq!(items, snapshot);
    }

    #[test]
    fn consumption_lowers_base_and_reserved_only() {
        let mut items = items_map(vec![item(1, 10, 6, 4)]);
        apply_consumption(&mut items, &[(Uuid::from_u128(1), 4)]).unwrap();

        let a = &items[&Uuid::from_u128(1)];
        assert_eq!(a.initial_quantity, 6);
        assert_eq!(a.available_quantity, 6);
        assert_eq!(a.reserved_quantity, 0);
    }

    #[test]
    fn release_does_not_credit_twice() {
        let mut items = items_map(vec![item(1, 10, 6, 4)]);
        let totals = vec![(Uuid::from_u128(1), 4)];

        apply_release(&mut items, &totals).unwrap();
        let first = items[&Uuid::from_u128(1)].clone();
        assert_eq!((first.available_quantity, first.reserved_quantity), (10, 0));

        // Segunda liberação encontra reserva zerada e não credita nada.
        apply_release(&mut items, &totals).unwrap();
        assert_eq!(items[&Uuid::from_u128(1)], first);
    }
}
