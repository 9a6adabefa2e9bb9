//! Record router: authenticates each call and splits records across the
//! metadata store and the blob store.
//!
//! Cross-store ordering is fixed. `create` writes the row before the blob,
//! `delete` removes the row before the blob. A failure between the two
//! steps leaves an orphan that is logged, never rolled back:
//!
//! - create: row without blob (`get` then reports `Storage`)
//! - delete: blob without row (unreachable, reclaimable offline)

use keepsafe_core::{
    AuthToken, NewRecord, Record, RecordId, RecordInfo, UserCredentials, UserId, VaultError,
    VaultResult,
};
use keepsafe_crypto::hash_password;
use keepsafe_storage::{BlobStore, MetadataStore, NewRow};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::auth::Authenticator;

/// Identity of the authenticated caller, built once per RPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: UserId,
}

pub struct Router<M, B, A> {
    meta: M,
    blobs: B,
    auth: A,
}

impl<M, B, A> Router<M, B, A>
where
    M: MetadataStore,
    B: BlobStore,
    A: Authenticator,
{
    pub fn new(meta: M, blobs: B, auth: A) -> Self {
        Self { meta, blobs, auth }
    }

    pub fn metadata_store(&self) -> &M {
        &self.meta
    }

    pub fn blob_store(&self) -> &B {
        &self.blobs
    }

    /// Resolve the caller. Runs before any store is touched.
    pub fn authenticate(&self, token: Option<&AuthToken>) -> VaultResult<CallContext> {
        let token = token.ok_or_else(|| VaultError::unauthenticated("missing auth token"))?;
        let caller = self.auth.validate(token)?;
        Ok(CallContext { caller })
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub async fn register(&self, creds: &UserCredentials) -> VaultResult<AuthToken> {
        let hash = credential_hash(creds)?;
        let user = self.meta.create_user(&creds.login, &hash).await?;
        info!(user_id = %user, "user registered");
        self.auth.issue(&user)
    }

    pub async fn login(&self, creds: &UserCredentials) -> VaultResult<AuthToken> {
        let hash = credential_hash(creds)?;
        let user = self.meta.authenticate_user(&creds.login, &hash).await?;
        debug!(user_id = %user, "user logged in");
        self.auth.issue(&user)
    }

    // ── Records ─────────────────────────────────────────────────────────

    pub async fn create(&self, ctx: &CallContext, record: NewRecord) -> VaultResult<RecordId> {
        let record_type = record.record_type;
        if !record_type.is_blob() {
            let id = self
                .meta
                .create(
                    &ctx.caller,
                    NewRow {
                        record_type,
                        metadata: record.metadata,
                        payload: Some(record.payload),
                    },
                )
                .await?;
            debug!(record_id = %id, %record_type, user_id = %ctx.caller, "record created");
            return Ok(id);
        }

        let id = self
            .meta
            .create(
                &ctx.caller,
                NewRow {
                    record_type,
                    metadata: record.metadata,
                    payload: None,
                },
            )
            .await?;

        if let Err(e) = self.blobs.create(&id, &record.payload).await {
            warn!(
                record_id = %id,
                user_id = %ctx.caller,
                error = %e,
                "blob write failed after row insert; row left without payload"
            );
            return Err(into_storage(e));
        }

        debug!(record_id = %id, %record_type, bytes = record.payload.len(), "file record created");
        Ok(id)
    }

    pub async fn get(&self, ctx: &CallContext, id: &RecordId) -> VaultResult<Record> {
        check_lookup_id(id)?;
        let row = self.meta.get(&ctx.caller, id).await?;

        let payload = if row.record_type.is_blob() {
            match self.blobs.get(id).await {
                Ok(bytes) => bytes,
                Err(VaultError::NotFound(_)) => {
                    error!(record_id = %id, "file record has no blob");
                    return Err(VaultError::storage(format!("payload missing for record {id}")));
                }
                Err(e) => return Err(into_storage(e)),
            }
        } else {
            row.payload.unwrap_or_default()
        };

        Ok(Record {
            id: row.id,
            record_type: row.record_type,
            metadata: row.metadata,
            payload,
        })
    }

    pub async fn delete(&self, ctx: &CallContext, id: &RecordId) -> VaultResult<()> {
        check_lookup_id(id)?;
        self.meta.delete(&ctx.caller, id).await?;

        match self.blobs.delete(id).await {
            Ok(()) | Err(VaultError::NotFound(_)) => {
                debug!(record_id = %id, user_id = %ctx.caller, "record deleted");
                Ok(())
            }
            Err(e) => {
                warn!(
                    record_id = %id,
                    error = %e,
                    "blob delete failed after row removal; blob orphaned"
                );
                Err(into_storage(e))
            }
        }
    }

    pub async fn list(&self, ctx: &CallContext) -> VaultResult<Vec<RecordInfo>> {
        self.meta.list_by_owner(&ctx.caller).await
    }

    /// Both stores answer their probe
    pub async fn ready(&self) -> VaultResult<()> {
        self.meta.ping().await?;
        self.blobs.ping().await
    }
}

fn credential_hash(creds: &UserCredentials) -> VaultResult<String> {
    if creds.login.is_empty() {
        return Err(VaultError::validation("login must not be empty"));
    }
    if creds.password.expose_secret().is_empty() {
        return Err(VaultError::validation("password must not be empty"));
    }
    Ok(hash_password(&creds.login, &creds.password))
}

// Path-like ids name no record; only the empty id is malformed.
fn check_lookup_id(id: &RecordId) -> VaultResult<()> {
    match id.validate() {
        Err(_) if !id.as_str().is_empty() => {
            Err(VaultError::NotFound(format!("record {id} not found")))
        }
        other => other,
    }
}

// Blob faults past the row write are store faults, whatever the backend said.
fn into_storage(e: VaultError) -> VaultError {
    match e {
        VaultError::Storage(_) => e,
        other => VaultError::storage(other.to_string()),
    }
}
