pub mod demand;
pub mod inventory;
pub mod reconciliation;
