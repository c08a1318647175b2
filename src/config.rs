// src/config.rs

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

use crate::{
    db::{DemandRepository, InventoryRepository},
    services::{DemandService, ReconciliationService, ReservationService, StockService},
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub stock_service: StockService,
    pub demand_service: DemandService,
    pub reconciliation_service: ReconciliationService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("Conexão com o banco de dados estabelecida");

        // --- Monta o gráfico de dependências ---
        let inventory_repo = InventoryRepository::new(db_pool.clone());
        let demand_repo = DemandRepository::new(db_pool.clone());

        let reservation_service = ReservationService::new(inventory_repo.clone());
        let stock_service = StockService::new(db_pool.clone(), inventory_repo.clone());
        let demand_service = DemandService::new(
            db_pool.clone(),
            demand_repo.clone(),
            inventory_repo.clone(),
            reservation_service,
        );
        let reconciliation_service = ReconciliationService::new(
            inventory_repo,
            demand_repo,
            stock_service.clone(),
        );

        Ok(Self {
            db_pool,
            stock_service,
            demand_service,
            reconciliation_service,
        })
    }
}
