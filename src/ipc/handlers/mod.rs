pub mod balances;
pub mod core;
pub mod reports;
pub mod validation;
