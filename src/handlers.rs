pub mod demands;
pub mod inventory;
pub mod reconciliation;
