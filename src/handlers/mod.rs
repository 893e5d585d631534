pub mod health_handlers;
pub mod vault_handlers;
