//src/main.rs

use axum::{
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use utoipa::OpenApi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é adequado aqui: sem configuração válida o processo não sobe.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let inventory_routes = Router::new()
        .route(
            "/",
            post(handlers::inventory::create_item).get(handlers::inventory::list_items),
        )
        .route("/stats", get(handlers::inventory::stats))
        .route(
            "/{id}",
            get(handlers::inventory::get_item).delete(handlers::inventory::deactivate_item),
        )
        .route("/{id}/entries", post(handlers::inventory::add_stock))
        .route("/{id}/withdrawals", post(handlers::inventory::withdraw_stock))
        .route("/{id}/movements", get(handlers::inventory::list_movements));

    let demand_routes = Router::new()
        .route(
            "/",
            post(handlers::demands::create_demand).get(handlers::demands::list_demands),
        )
        .route("/stats", get(handlers::demands::stats))
        .route("/{id}", get(handlers::demands::get_demand))
        .route("/{id}/commit", post(handlers::demands::commit_demand))
        .route("/{id}/reject", post(handlers::demands::reject_demand))
        .route("/{id}/cancel", post(handlers::demands::cancel_demand))
        .route("/{id}/fulfill", post(handlers::demands::fulfill_demand));

    let reconciliation_routes = Router::new().route(
        "/run",
        post(handlers::reconciliation::run_reconciliation),
    );

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(docs::ApiDoc::openapi()) }),
        )
        .nest("/api/inventory", inventory_routes)
        .nest("/api/demands", demand_routes)
        .nest("/api/reconciliation", reconciliation_routes)
        .with_state(app_state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!(
        "🚀 Servidor escutando em {}",
        listener.local_addr().expect("listener sem endereço local")
    );
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
