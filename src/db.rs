pub mod demand_repo;
pub use demand_repo::DemandRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
