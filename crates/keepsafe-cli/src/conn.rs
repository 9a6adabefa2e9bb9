//! Transport seam between the session and the server

use anyhow::Context;
use async_trait::async_trait;
use keepsafe_core::proto::{self, keeper_client::KeeperClient};
use keepsafe_core::wire::{record_from_proto, record_info_from_proto};
use keepsafe_core::{
    AuthToken, NewRecord, Record, RecordId, RecordInfo, UserCredentials, VaultError, VaultResult,
};
use secrecy::ExposeSecret;
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

/// Metadata key carrying `Bearer <token>`
pub const AUTH_METADATA_KEY: &str = "authorization";

/// One vault call per method. Tokens are passed explicitly on every call.
#[async_trait]
pub trait VaultConn: Send + Sync {
    async fn register(&self, creds: &UserCredentials) -> VaultResult<AuthToken>;
    async fn login(&self, creds: &UserCredentials) -> VaultResult<AuthToken>;
    async fn list(&self, token: &AuthToken) -> VaultResult<Vec<RecordInfo>>;
    async fn get(&self, token: &AuthToken, id: &RecordId) -> VaultResult<Record>;
    async fn create(&self, token: &AuthToken, record: NewRecord) -> VaultResult<RecordId>;
    async fn delete(&self, token: &AuthToken, id: &RecordId) -> VaultResult<()>;
}

/// [`VaultConn`] over the tonic Keeper client
#[derive(Clone)]
pub struct GrpcConn {
    client: KeeperClient<Channel>,
}

impl GrpcConn {
    /// Connect to `addr` (e.g. "http://127.0.0.1:3200")
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let channel = Endpoint::from_shared(addr.to_string())
            .with_context(|| format!("invalid server address: {addr}"))?
            .connect_timeout(Duration::from_secs(5))
            .connect()
            .await
            .with_context(|| format!("connecting to keepsafed at {addr}"))?;
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: KeeperClient::new(channel),
        }
    }
}

fn authed<T>(msg: T, token: &AuthToken) -> VaultResult<Request<T>> {
    let value = MetadataValue::try_from(format!("Bearer {}", token.as_str()))
        .map_err(|_| VaultError::unauthenticated("token is not valid request metadata"))?;
    let mut req = Request::new(msg);
    req.metadata_mut().insert(AUTH_METADATA_KEY, value);
    Ok(req)
}

fn status(s: tonic::Status) -> VaultError {
    VaultError::from_status(&s)
}

fn credentials(creds: &UserCredentials) -> proto::UserCredentials {
    proto::UserCredentials {
        login: creds.login.clone(),
        password: creds.password.expose_secret().to_string(),
    }
}

#[async_trait]
impl VaultConn for GrpcConn {
    async fn register(&self, creds: &UserCredentials) -> VaultResult<AuthToken> {
        let mut client = self.client.clone();
        let session = client.register(credentials(creds)).await.map_err(status)?;
        Ok(AuthToken::new(session.into_inner().token))
    }

    async fn login(&self, creds: &UserCredentials) -> VaultResult<AuthToken> {
        let mut client = self.client.clone();
        let session = client.login(credentials(creds)).await.map_err(status)?;
        Ok(AuthToken::new(session.into_inner().token))
    }

    async fn list(&self, token: &AuthToken) -> VaultResult<Vec<RecordInfo>> {
        let mut client = self.client.clone();
        let list = client
            .list_records(authed(proto::Empty {}, token)?)
            .await
            .map_err(status)?
            .into_inner();
        list.records.into_iter().map(record_info_from_proto).collect()
    }

    async fn get(&self, token: &AuthToken, id: &RecordId) -> VaultResult<Record> {
        let mut client = self.client.clone();
        let record = client
            .get_record(authed(proto::RecordRef::from(id.clone()), token)?)
            .await
            .map_err(status)?
            .into_inner();
        record_from_proto(record)
    }

    async fn create(&self, token: &AuthToken, record: NewRecord) -> VaultResult<RecordId> {
        let mut client = self.client.clone();
        let created = client
            .create_record(authed(proto::NewRecord::from(record), token)?)
            .await
            .map_err(status)?
            .into_inner();
        Ok(RecordId::new(created.id))
    }

    async fn delete(&self, token: &AuthToken, id: &RecordId) -> VaultResult<()> {
        let mut client = self.client.clone();
        client
            .delete_record(authed(proto::RecordRef::from(id.clone()), token)?)
            .await
            .map_err(status)?;
        Ok(())
    }
}
