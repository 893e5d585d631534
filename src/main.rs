use anyhow::Result;
use file_vault::{build_object_store, build_state, config, db, routes};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("file_vault=info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = config::AppConfig::from_env_and_args()?;

    if let config::Mode::IssueToken(owner) = &mode {
        let gate = file_vault::middleware::AuthGate::new(cfg.jwt_secret.as_bytes());
        let token = gate
            .issue(owner, cfg.token_ttl)
            .map_err(|e| anyhow::anyhow!("issuing token: {}", e))?;
        println!("{}", token);
        return Ok(());
    }

    tracing::info!("Starting file-vault with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let pool = db::connect(&cfg.database_url, cfg.db_max_connections, cfg.io_timeout).await?;
    db::run_migrations(&pool).await?;

    // --- Handle migration mode ---
    if mode == config::Mode::Migrate {
        tracing::info!("Database migration complete.");
        pool.close().await;
        return Ok(()); // exit after migration
    }

    let db = Arc::new(pool);

    // --- Initialize core service ---
    let objects = build_object_store(&cfg)?;
    let state = build_state(db.clone(), objects, cfg.jwt_secret.as_bytes());

    // --- Build router ---
    let app = routes::routes::routes(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Teardown ---
    tracing::info!("Shutting down; closing database pool");
    db.close().await;

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
