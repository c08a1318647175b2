pub mod demand_service;
pub use demand_service::DemandService;
pub mod reconciliation_service;
pub use reconciliation_service::ReconciliationService;
pub mod reservation_service;
pub use reservation_service::ReservationService;
pub mod stock_service;
pub use stock_service::StockService;
