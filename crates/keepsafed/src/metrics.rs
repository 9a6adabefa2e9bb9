//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness probe (always 200 if process is running)
//!   GET /readyz   - Readiness probe (200 if both stores answer)

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use keepsafe_core::{VaultError, VaultResult};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RpcLabels {
    pub method: String,
    pub outcome: String,
}

/// Per-RPC request counters (`keepsafe_rpc_requests_total`)
#[derive(Clone, Default)]
pub struct RpcMetrics {
    requests: Family<RpcLabels, Counter>,
}

impl RpcMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "keepsafe_rpc_requests",
            "gRPC requests by method and outcome",
            metrics.requests.clone(),
        );
        metrics
    }

    pub fn record<T>(&self, method: &str, result: &VaultResult<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => outcome_label(e),
        };
        self.requests
            .get_or_create(&RpcLabels {
                method: method.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn count(&self, method: &str, outcome: &str) -> u64 {
        self.requests
            .get_or_create(&RpcLabels {
                method: method.to_string(),
                outcome: outcome.to_string(),
            })
            .get()
    }
}

fn outcome_label(e: &VaultError) -> &'static str {
    match e {
        VaultError::Validation(_) => "invalid_argument",
        VaultError::Authentication(_) => "unauthenticated",
        VaultError::Conflict(_) => "already_exists",
        VaultError::NotFound(_) => "not_found",
        VaultError::Crypto(_) | VaultError::Storage(_) => "internal",
    }
}

/// Something the readiness probe can ask
#[async_trait]
pub trait Readiness: Send + Sync {
    async fn ready(&self) -> VaultResult<()>;
}

#[async_trait]
impl<M, B, A> Readiness for crate::router::Router<M, B, A>
where
    M: keepsafe_storage::MetadataStore,
    B: keepsafe_storage::BlobStore,
    A: crate::auth::Authenticator,
{
    async fn ready(&self) -> VaultResult<()> {
        crate::router::Router::ready(self).await
    }
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub readiness: Arc<dyn Readiness>,
}

pub fn app(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Serve metrics and health endpoints on `addr` (e.g. "127.0.0.1:9200")
pub async fn serve(addr: String, state: HealthState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, app(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.readiness.ready().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "stores unreachable")
        }
    }
}
