use crate::{middleware::auth::AuthGate, services::vault_service::VaultService};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler. All fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub vault: VaultService,
    pub auth: AuthGate,
    /// Pool behind the catalog and key store; used directly by `/readyz`.
    pub db: Arc<SqlitePool>,
}
