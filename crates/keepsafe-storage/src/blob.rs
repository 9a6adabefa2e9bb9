//! Blob store: one opaque ciphertext object per file record

use anyhow::{Context, Result};
use async_trait::async_trait;
use keepsafe_core::{RecordId, VaultError, VaultResult};
use opendal::Operator;
use std::path::Path;
use tracing::error;

/// Ciphertext objects keyed by record id.
///
/// `get` and `delete` report a missing object as `NotFound`; callers decide
/// whether that is an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create(&self, id: &RecordId, bytes: &[u8]) -> VaultResult<()>;
    async fn get(&self, id: &RecordId) -> VaultResult<Vec<u8>>;
    async fn delete(&self, id: &RecordId) -> VaultResult<()>;

    /// Cheap reachability probe for readiness checks
    async fn ping(&self) -> VaultResult<()> {
        Ok(())
    }
}

/// [`BlobStore`] over an OpenDAL operator. The object path is the record id.
#[derive(Clone)]
pub struct OperatorBlobStore {
    op: Operator,
}

impl OperatorBlobStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// Filesystem backend rooted at `root`.
    ///
    /// `retries == 0` leaves the retry layer off.
    pub fn fs(root: &Path, retries: usize) -> Result<Self> {
        let builder = opendal::services::Fs::default().root(&root.to_string_lossy());

        let op = Operator::new(builder)
            .with_context(|| format!("creating OpenDAL fs operator at {}", root.display()))?
            .layer(opendal::layers::LoggingLayer::default());
        let op = if retries > 0 {
            op.layer(
                opendal::layers::RetryLayer::new()
                    .with_max_times(retries)
                    .with_jitter(),
            )
            .finish()
        } else {
            op.finish()
        };

        Ok(Self { op })
    }

    /// Volatile in-memory backend
    pub fn memory() -> Result<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish();
        Ok(Self { op })
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

fn blob_path(id: &RecordId) -> VaultResult<&str> {
    id.validate()?;
    Ok(id.as_str())
}

fn blob_err(op: &'static str, id: &RecordId, e: opendal::Error) -> VaultError {
    if e.kind() == opendal::ErrorKind::NotFound {
        return VaultError::NotFound(format!("blob {id}"));
    }
    error!(op, record_id = %id, error = %e, "blob store operation failed");
    VaultError::storage(format!("blob {op} {id}: {e}"))
}

#[async_trait]
impl BlobStore for OperatorBlobStore {
    async fn create(&self, id: &RecordId, bytes: &[u8]) -> VaultResult<()> {
        let path = blob_path(id)?;
        self.op
            .write(path, bytes.to_vec())
            .await
            .map(|_| ())
            .map_err(|e| blob_err("write", id, e))
    }

    async fn get(&self, id: &RecordId) -> VaultResult<Vec<u8>> {
        let path = blob_path(id)?;
        self.op
            .read(path)
            .await
            .map(|buf| buf.to_vec())
            .map_err(|e| blob_err("read", id, e))
    }

    async fn delete(&self, id: &RecordId) -> VaultResult<()> {
        let path = blob_path(id)?;
        // OpenDAL deletes are idempotent; surface absence explicitly.
        match self.op.exists(path).await {
            Ok(true) => {}
            Ok(false) => return Err(VaultError::NotFound(format!("blob {id}"))),
            Err(e) => return Err(blob_err("stat", id, e)),
        }
        self.op.delete(path).await.map_err(|e| blob_err("delete", id, e))
    }

    async fn ping(&self) -> VaultResult<()> {
        crate::health::check_health(&self.op)
            .await
            .map_err(|e| VaultError::storage(e.to_string()))
    }
}
