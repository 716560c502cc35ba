use async_trait::async_trait;
use bitcoin::BlockHash;

/// Height index of the already-validated header chain.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Current best height.
    async fn tip_height(&self) -> anyhow::Result<u32>;

    /// Block hash at an exact height. Errors for heights the chain does not know.
    async fn hash_at_height(&self, height: u32) -> anyhow::Result<BlockHash>;
}
