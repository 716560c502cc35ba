//! Abstractions for fetching compact filters and blocks from the sync layer (HTTP or P2P).
use async_trait::async_trait;
use bitcoin::BlockHash;

/// Provider of per-block BIP-158 data.
#[async_trait]
pub trait FilterSource: Send + Sync {
    /// Raw *regular* (basic) filter bytes for `block`, or `None` when the
    /// filter is not available locally.
    async fn get_cfilter(&self, block: BlockHash) -> anyhow::Result<Option<Vec<u8>>>;

    /// Raw consensus-encoded block bytes for `block` (used after a filter hit).
    async fn get_block(&self, block: BlockHash) -> anyhow::Result<Vec<u8>>;
}
