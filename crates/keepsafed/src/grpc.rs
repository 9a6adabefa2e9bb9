//! tonic gRPC server over TCP

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::metadata::MetadataMap;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{error, info};

use keepsafe_core::proto::{
    self,
    keeper_server::{Keeper, KeeperServer},
};
use keepsafe_core::wire::new_record_from_proto;
use keepsafe_core::{AuthToken, RecordId, UserCredentials, VaultError, VaultResult};
use keepsafe_storage::{BlobStore, MetadataStore};

use crate::auth::Authenticator;
use crate::metrics::RpcMetrics;
use crate::router::{CallContext, Router};

/// Metadata key carrying `Bearer <token>`
pub const AUTH_METADATA_KEY: &str = "authorization";

/// Implementation of the Keeper gRPC service
pub struct KeeperService<M, B, A> {
    router: Arc<Router<M, B, A>>,
    metrics: RpcMetrics,
}

impl<M, B, A> KeeperService<M, B, A>
where
    M: MetadataStore + 'static,
    B: BlobStore + 'static,
    A: Authenticator + 'static,
{
    pub fn new(router: Arc<Router<M, B, A>>, metrics: RpcMetrics) -> Self {
        Self { router, metrics }
    }

    fn authenticate(&self, metadata: &MetadataMap) -> VaultResult<CallContext> {
        let token = bearer_token(metadata)?;
        self.router.authenticate(token.as_ref())
    }

    fn finish<T>(&self, method: &'static str, result: VaultResult<T>) -> Result<Response<T>, Status> {
        self.metrics.record(method, &result);
        match result {
            Ok(body) => Ok(Response::new(body)),
            Err(e) => {
                if matches!(e, VaultError::Storage(_) | VaultError::Crypto(_)) {
                    error!(method, error = %e, "rpc failed");
                }
                Err(e.into())
            }
        }
    }
}

/// Pull the bearer token out of request metadata. Absent is `Ok(None)`.
pub fn bearer_token(metadata: &MetadataMap) -> VaultResult<Option<AuthToken>> {
    let Some(value) = metadata.get(AUTH_METADATA_KEY) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| VaultError::unauthenticated("authorization header is not ASCII"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| VaultError::unauthenticated("authorization header is not a bearer token"))?
        .trim();
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Some(AuthToken::new(token)))
}

fn credentials(msg: proto::UserCredentials) -> UserCredentials {
    UserCredentials::new(msg.login, msg.password)
}

#[tonic::async_trait]
impl<M, B, A> Keeper for KeeperService<M, B, A>
where
    M: MetadataStore + 'static,
    B: BlobStore + 'static,
    A: Authenticator + 'static,
{
    async fn register(
        &self,
        request: Request<proto::UserCredentials>,
    ) -> Result<Response<proto::Session>, Status> {
        let creds = credentials(request.into_inner());
        let result = self.router.register(&creds).await;
        self.finish(
            "register",
            result.map(|t| proto::Session {
                token: t.as_str().to_string(),
            }),
        )
    }

    async fn login(
        &self,
        request: Request<proto::UserCredentials>,
    ) -> Result<Response<proto::Session>, Status> {
        let creds = credentials(request.into_inner());
        let result = self.router.login(&creds).await;
        self.finish(
            "login",
            result.map(|t| proto::Session {
                token: t.as_str().to_string(),
            }),
        )
    }

    async fn list_records(
        &self,
        request: Request<proto::Empty>,
    ) -> Result<Response<proto::RecordList>, Status> {
        let ctx = self.authenticate(request.metadata());
        let result = match ctx {
            Ok(ctx) => self.router.list(&ctx).await,
            Err(e) => Err(e),
        };
        self.finish(
            "list_records",
            result.map(|records| proto::RecordList {
                records: records.into_iter().map(Into::into).collect(),
            }),
        )
    }

    async fn get_record(
        &self,
        request: Request<proto::RecordRef>,
    ) -> Result<Response<proto::Record>, Status> {
        let ctx = self.authenticate(request.metadata());
        let result = match ctx {
            Ok(ctx) => {
                let id = RecordId::new(request.into_inner().id);
                self.router.get(&ctx, &id).await
            }
            Err(e) => Err(e),
        };
        self.finish("get_record", result.map(Into::into))
    }

    async fn create_record(
        &self,
        request: Request<proto::NewRecord>,
    ) -> Result<Response<proto::RecordRef>, Status> {
        let ctx = self.authenticate(request.metadata());
        let result = match ctx {
            Ok(ctx) => match new_record_from_proto(request.into_inner()) {
                Ok(record) => self.router.create(&ctx, record).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.finish("create_record", result.map(Into::into))
    }

    async fn delete_record(
        &self,
        request: Request<proto::RecordRef>,
    ) -> Result<Response<proto::Empty>, Status> {
        let ctx = self.authenticate(request.metadata());
        let result = match ctx {
            Ok(ctx) => {
                let id = RecordId::new(request.into_inner().id);
                self.router.delete(&ctx, &id).await
            }
            Err(e) => Err(e),
        };
        self.finish("delete_record", result.map(|()| proto::Empty {}))
    }
}

/// Serve the Keeper service on an already-bound listener until `shutdown` resolves
pub async fn serve<M, B, A, F>(
    listener: TcpListener,
    service: KeeperService<M, B, A>,
    shutdown: F,
) -> Result<()>
where
    M: MetadataStore + 'static,
    B: BlobStore + 'static,
    A: Authenticator + 'static,
    F: Future<Output = ()> + Send,
{
    let addr = listener.local_addr()?;
    let stream = TcpListenerStream::new(listener);

    info!(addr = %addr, "gRPC server ready");

    Server::builder()
        .add_service(KeeperServer::new(service))
        .serve_with_incoming_shutdown(stream, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("gRPC server error: {e}"))
}
