//! Defines routes for the vault API.
//!
//! ## Structure
//! - **Probes** (no auth)
//!   - `GET  /healthz` - liveness
//!   - `GET  /readyz` - database + object store readiness
//!
//! - **Vault endpoints** (bearer token required)
//!   - `POST /api/upload` - multipart `file` + `encryption_key`
//!   - `GET  /api/files` - caller's files
//!   - `POST /api/download/{fileId}` - form `encryption_key`, returns plaintext

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        vault_handlers::{download_file, list_files, upload_file},
    },
    middleware::auth::require_identity,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

/// Build the full router with state attached.
///
/// `max_upload_bytes` bounds every request body on the API routes.
pub fn routes(state: AppState, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        .route("/download/{file_id}", post(download_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_identity,
        ));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api", api)
        .with_state(state)
}
