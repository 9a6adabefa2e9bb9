//! Blob backend health check

use anyhow::Result;
use opendal::Operator;

/// Verify the backend answers by listing the root
pub async fn check_health(op: &Operator) -> Result<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("blob store health check failed: {e}"))
}
