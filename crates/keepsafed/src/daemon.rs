//! Server lifecycle: open stores, start metrics, serve gRPC

use anyhow::{Context, Result};
use keepsafe_core::config::{KeepsafeConfig, TOKEN_SECRET_ENV};
use keepsafe_storage::{OperatorBlobStore, SqlMetadataStore};
use prometheus_client::registry::Registry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::auth::JwtAuthenticator;
use crate::grpc::KeeperService;
use crate::metrics::{HealthState, RpcMetrics};
use crate::router::Router;

pub async fn run(config: KeepsafeConfig) -> Result<()> {
    let secret = config.auth.resolve_secret().with_context(|| {
        format!("no token secret: set auth.token_secret or {TOKEN_SECRET_ENV}")
    })?;

    // ── Metadata store ───────────────────────────────────────────────────
    ensure_sqlite_parent(&config.database.url).await?;
    let meta = SqlMetadataStore::open(&config.database.url, config.database.max_connections).await?;
    info!(max_connections = config.database.max_connections, "metadata store: opened");

    // ── Blob store ───────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&config.blobs.root)
        .await
        .with_context(|| format!("creating blob root {}", config.blobs.root.display()))?;
    let blobs = OperatorBlobStore::fs(&config.blobs.root, config.blobs.retries)?;
    match keepsafe_storage::check_health(blobs.operator()).await {
        Ok(()) => info!(root = %config.blobs.root.display(), "blob store: ready"),
        Err(e) => warn!(root = %config.blobs.root.display(), "blob store: {e}"),
    }

    let auth = JwtAuthenticator::new(&secret, Duration::from_secs(config.auth.token_ttl_secs));
    let router = Arc::new(Router::new(meta, blobs, auth));

    // Start Prometheus metrics endpoint
    let mut registry = Registry::default();
    let metrics = RpcMetrics::register(&mut registry);
    if let Some(addr) = config.server.metrics_addr.clone() {
        let state = HealthState {
            registry: Arc::new(registry),
            readiness: router.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, state).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    // Start gRPC server
    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding gRPC listener {}", config.server.listen))?;
    info!(listen = %config.server.listen, "gRPC: listening");

    let service = KeeperService::new(router, metrics);
    crate::grpc::serve(listener, service, shutdown_signal()).await?;

    info!("keepsafed stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("installing ctrl-c handler failed: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// SQLite will not create missing parent directories for the database file
async fn ensure_sqlite_parent(url: &str) -> Result<()> {
    let Some(path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_sqlite_parent_creates_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = tmp.path().join("nested/dir/metadata.db");
        ensure_sqlite_parent(&format!("sqlite://{}?mode=rwc", db.display()))
            .await
            .unwrap();
        assert!(tmp.path().join("nested/dir").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_sqlite_parent_ignores_memory() {
        ensure_sqlite_parent("sqlite::memory:").await.unwrap();
    }

    #[tokio::test]
    async fn test_run_requires_token_secret() {
        if std::env::var(TOKEN_SECRET_ENV).is_ok() {
            return;
        }
        let err = run(KeepsafeConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("token secret"), "{err:#}");
    }

    #[tokio::test]
    async fn test_run_leaves_startup_banner_to_binary() {
        use std::sync::{Arc, Mutex};

        if std::env::var(TOKEN_SECRET_ENV).is_ok() {
            return;
        }
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || Sink(sink.clone()))
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        run(KeepsafeConfig::default()).await.unwrap_err();
        let logs = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(!logs.contains("keepsafed starting"), "{logs}");
    }

    struct Sink(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Sink {
        fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(b);
            Ok(b.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
