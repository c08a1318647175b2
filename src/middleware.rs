pub mod actor;
pub mod tenancy;
