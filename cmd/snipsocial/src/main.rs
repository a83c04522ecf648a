//! # snipsocial server
//!
//! Loads settings, picks the storage backend, and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::JwtVerifier;
use configs::{DatabaseBackend, DatabaseSettings, ExposeSecret, LogFormat, LogSettings, Settings};
use domains::{Store, SystemClock};
use services::Services;
use storage_adapters::MemoryStore;
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn build_store(db: &DatabaseSettings) -> anyhow::Result<Arc<dyn Store>> {
    match db.backend {
        DatabaseBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "db-postgres")]
        DatabaseBackend::Postgres => {
            let url = db.url.as_ref().context("database.url is not set")?;
            let store = storage_adapters::PgStore::connect(url.expose_secret(), db.max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-postgres"))]
        DatabaseBackend::Postgres => {
            anyhow::bail!("this build has no postgres support; rebuild with the db-postgres feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);

    let store = build_store(&settings.database).await?;
    let verifier = Arc::new(JwtVerifier::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        settings.auth.issuer.as_deref(),
    ));
    let services = Services::new(store, Arc::new(SystemClock));
    let app = router(AppState::new(services, verifier));

    let listener = tokio::net::TcpListener::bind(settings.server.bind_addr())
        .await
        .with_context(|| format!("binding {}", settings.server.bind_addr()))?;
    tracing::info!(addr = %listener.local_addr()?, backend = ?settings.database.backend, "snipsocial listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
