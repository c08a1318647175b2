// src/db/inventory_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{InventoryItem, InventoryStats, MovementKind, StockMovement},
};

/// Dados de criação de um lote.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub product_code: String,
    pub lot: String,
    pub display_name: String,
    pub initial_quantity: i64,
    pub unit_price: Decimal,
    pub expiration_date: Option<NaiveDate>,
    pub entry_date: Option<NaiveDate>,
}

/// Filtros da listagem de lotes ativos (caminho de leitura dos relatórios).
#[derive(Debug, Clone, Default)]
pub struct ListItemsFilter {
    pub product_code: Option<String>,
    pub expiring_before: Option<NaiveDate>,
    pub low_stock_below: Option<i64>,
    pub include_inactive: bool,
}

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leituras (pool principal)
    // ---

    pub async fn get_item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<InventoryItem, AppError> {
        sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ItemNotFound)
    }

    pub async fn list_items(
        &self,
        tenant_id: Uuid,
        filter: &ListItemsFilter,
    ) -> Result<Vec<InventoryItem>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT * FROM inventory_items WHERE tenant_id = ",
        );
        qb.push_bind(tenant_id);

        if !filter.include_inactive {
            qb.push(" AND active = TRUE");
        }
        if let Some(code) = &filter.product_code {
            qb.push(" AND product_code = ");
            qb.push_bind(code);
        }
        if let Some(date) = filter.expiring_before {
            qb.push(" AND expiration_date IS NOT NULL AND expiration_date <= ");
            qb.push_bind(date);
        }
        if let Some(threshold) = filter.low_stock_below {
            qb.push(" AND available_quantity < ");
            qb.push_bind(threshold);
        }
        qb.push(" ORDER BY display_name ASC, lot ASC");

        let items = qb
            .build_query_as::<InventoryItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn list_movements(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE tenant_id = $1 AND inventory_item_id = $2
            ORDER BY performed_at DESC, id DESC
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Números do painel. Lote com menos de 10 unidades livres conta como
    /// estoque baixo.
    pub async fn stats(&self, tenant_id: Uuid) -> Result<InventoryStats, AppError> {
        let stats = sqlx::query_as::<_, InventoryStats>(
            r#"
            SELECT
                COALESCE(SUM(available_quantity), 0)::BIGINT AS total_units,
                COALESCE(SUM(available_quantity * unit_price), 0) AS total_value,
                COUNT(*) FILTER (
                    WHERE expiration_date < CURRENT_DATE AND available_quantity > 0
                ) AS expired_lots,
                COUNT(*) FILTER (
                    WHERE expiration_date >= CURRENT_DATE
                      AND expiration_date <= CURRENT_DATE + 30
                      AND available_quantity > 0
                ) AS expiring_30_days,
                COUNT(*) FILTER (
                    WHERE available_quantity > 0 AND available_quantity < 10
                ) AS low_stock_lots
            FROM inventory_items
            WHERE tenant_id = $1 AND active = TRUE
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    // ---
    // Escritas (transacionais, padrão Executor genérico)
    // ---

    /// Insere o lote com disponível = inicial e reserva zero. A violação do
    /// índice único parcial (tenant, produto, lote ativos) vira DuplicateLot.
    pub async fn create_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        new_item: &NewInventoryItem,
    ) -> Result<InventoryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory_items
                (tenant_id, product_code, lot, display_name,
                 initial_quantity, available_quantity, reserved_quantity,
                 unit_price, expiration_date, entry_date)
            VALUES ($1, $2, $3, $4, $5, $5, 0, $6, $7, COALESCE($8, CURRENT_DATE))
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&new_item.product_code)
        .bind(&new_item.lot)
        .bind(&new_item.display_name)
        .bind(new_item.initial_quantity)
        .bind(new_item.unit_price)
        .bind(new_item.expiration_date)
        .bind(new_item.entry_date)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateLot {
                        product_code: new_item.product_code.clone(),
                        lot: new_item.lot.clone(),
                    };
                }
            }
            e.into()
        })
    }

    /// Lê um lote com lock de linha, para read-modify-write atômico.
    pub async fn get_item_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<InventoryItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::ItemNotFound)
    }

    /// Lock de um conjunto de lotes em ordem ascendente de id — ordem fixa
    /// para que dois commits concorrentes não se bloqueiem em círculo.
    pub async fn get_items_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<InventoryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE tenant_id = $1 AND id = ANY($2)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(item_ids)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    /// Persiste o novo trio de quantidades de um lote já travado.
    pub async fn update_quantities<'e, E>(
        &self,
        executor: E,
        item: &InventoryItem,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET initial_quantity = $3,
                available_quantity = $4,
                reserved_quantity = $5,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(item.tenant_id)
        .bind(item.id)
        .bind(item.initial_quantity)
        .bind(item.available_quantity)
        .bind(item.reserved_quantity)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ItemNotFound);
        }
        Ok(())
    }

    /// Desativação lógica, carimbando quem desativou; o histórico de
    /// movimentações permanece.
    pub async fn deactivate<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET active = FALSE, deactivated_by = $3, deactivated_at = now(),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2 AND active = TRUE
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .bind(actor_id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ItemNotFound);
        }
        Ok(())
    }

    /// Registra uma linha no livro-razão. Sempre dentro da mesma transação
    /// que altera o lote; uma tentativa abortada não deixa movimentação.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_movement<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
        kind: MovementKind,
        quantity: i64,
        previous_available: i64,
        new_available: i64,
        reason: &str,
        performed_by: Uuid,
        demand_record_id: Option<Uuid>,
    ) -> Result<StockMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements
                (tenant_id, inventory_item_id, kind, quantity,
                 previous_available, new_available, reason, performed_by, demand_record_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .bind(kind)
        .bind(quantity)
        .bind(previous_available)
        .bind(new_available)
        .bind(reason)
        .bind(performed_by)
        .bind(demand_record_id)
        .fetch_one(executor)
        .await?;
        Ok(movement)
    }
}
