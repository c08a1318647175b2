// src/db/demand_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::demand::{DemandLineItem, DemandRecord, DemandStats, DemandStatus},
};

/// Dados de criação de uma solicitação.
#[derive(Debug, Clone)]
pub struct NewDemand {
    pub requester_id: Uuid,
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub notes: Option<String>,
}

/// Linha já enriquecida com o snapshot do produto, pronta para inserir.
#[derive(Debug, Clone)]
pub struct NewDemandLine {
    pub inventory_item_id: Uuid,
    pub product_code: String,
    pub display_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ListDemandsFilter {
    pub status: Option<DemandStatus>,
    pub subject_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Clone)]
pub struct DemandRepository {
    pool: PgPool,
}

impl DemandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leituras
    // ---

    pub async fn get_record(
        &self,
        tenant_id: Uuid,
        demand_id: Uuid,
    ) -> Result<DemandRecord, AppError> {
        sqlx::query_as::<_, DemandRecord>(
            "SELECT * FROM demand_records WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(demand_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::DemandNotFound)
    }

    pub async fn list_records(
        &self,
        tenant_id: Uuid,
        filter: &ListDemandsFilter,
    ) -> Result<Vec<DemandRecord>, AppError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT * FROM demand_records WHERE tenant_id = ");
        qb.push_bind(tenant_id);

        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(subject) = &filter.subject_id {
            qb.push(" AND subject_id = ");
            qb.push_bind(subject);
        }
        qb.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }

        let records = qb
            .build_query_as::<DemandRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<DemandStats, AppError> {
        let stats = sqlx::query_as::<_, DemandStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
                COUNT(*) FILTER (WHERE status = 'COMMITTED') AS committed,
                COUNT(*) FILTER (WHERE status = 'FULFILLED') AS fulfilled,
                COUNT(*) FILTER (WHERE status = 'REJECTED') AS rejected,
                COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled
            FROM demand_records
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Pares (lote, quantidade) de todas as solicitações COMMITTED do
    /// tenant — a entrada da derivação da auditoria.
    pub async fn committed_lines(&self, tenant_id: Uuid) -> Result<Vec<(Uuid, i64)>, AppError> {
        let lines = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT l.inventory_item_id, l.quantity
            FROM demand_line_items l
            JOIN demand_records d ON d.id = l.demand_id
            WHERE d.tenant_id = $1 AND d.status = 'COMMITTED'
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    pub async fn committed_count(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM demand_records WHERE tenant_id = $1 AND status = 'COMMITTED'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ---
    // Escritas (transacionais)
    // ---

    pub async fn create_record<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        new_demand: &NewDemand,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, DemandRecord>(
            r#"
            INSERT INTO demand_records (tenant_id, requester_id, subject_id, subject_name, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new_demand.requester_id)
        .bind(&new_demand.subject_id)
        .bind(&new_demand.subject_name)
        .bind(&new_demand.notes)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }

    pub async fn insert_line<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
        line: &NewDemandLine,
        position: i32,
    ) -> Result<DemandLineItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, DemandLineItem>(
            r#"
            INSERT INTO demand_line_items
                (tenant_id, demand_id, inventory_item_id, product_code,
                 display_name, quantity, unit_price, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .bind(line.inventory_item_id)
        .bind(&line.product_code)
        .bind(&line.display_name)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(position)
        .fetch_one(executor)
        .await?;
        Ok(inserted)
    }

    /// Lê o registro com lock de linha — o dono da transição segura o
    /// registro até o fim da transação.
    pub async fn get_record_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, DemandRecord>(
            "SELECT * FROM demand_records WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(demand_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::DemandNotFound)
    }

    /// Linhas são imutáveis após a criação; leitura simples serve dentro ou
    /// fora de transação.
    pub async fn get_lines<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
    ) -> Result<Vec<DemandLineItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, DemandLineItem>(
            r#"
            SELECT * FROM demand_line_items
            WHERE tenant_id = $1 AND demand_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }

    pub async fn mark_committed<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, DemandRecord>(
            r#"
            UPDATE demand_records
            SET status = 'COMMITTED', committed_by = $3, committed_at = now(), updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .bind(actor_id)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }

    pub async fn mark_fulfilled<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, DemandRecord>(
            r#"
            UPDATE demand_records
            SET status = 'FULFILLED', fulfilled_by = $3, fulfilled_at = now(), updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .bind(actor_id)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }

    pub async fn mark_rejected<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
        reason: &str,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, DemandRecord>(
            r#"
            UPDATE demand_records
            SET status = 'REJECTED', rejected_by = $3, rejected_at = now(),
                rejection_reason = $4, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .bind(actor_id)
        .bind(reason)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }

    pub async fn mark_cancelled<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        demand_id: Uuid,
        actor_id: Uuid,
    ) -> Result<DemandRecord, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, DemandRecord>(
            r#"
            UPDATE demand_records
            SET status = 'CANCELLED', cancelled_by = $3, cancelled_at = now(), updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(demand_id)
        .bind(actor_id)
        .fetch_one(executor)
        .await?;
        Ok(record)
    }
}
