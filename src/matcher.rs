use bitcoin::{bip158::BlockFilter, Address, BlockHash, ScriptBuf};
use tracing::debug;

/// Outcome of testing one block's filter against a script set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCheck {
    /// At least one script may be in the block.
    Hit,
    /// None of the scripts are in the block.
    Miss,
    /// No filter available for the block.
    Absent,
    /// Filter bytes could not be decoded.
    Unreadable,
}

impl FilterCheck {
    /// Only a [`FilterCheck::Hit`] warrants fetching the block.
    pub fn is_hit(self) -> bool {
        matches!(self, FilterCheck::Hit)
    }
}

/// Raw GCS query. The SipHash key is derived from `block_hash` inside
/// `match_any`, so every query against one block uses the same key.
pub fn filter_matches_any<'a, I>(
    block_hash: BlockHash,
    raw_filter: &[u8],
    scripts: I,
) -> Result<bool, bitcoin::bip158::Error>
where
    I: IntoIterator<Item = &'a ScriptBuf>,
{
    let filter = BlockFilter::new(raw_filter);
    let mut it = scripts.into_iter().map(|s| s.as_bytes());
    filter.match_any(&block_hash, &mut it)
}

/// Test `filter` against `scripts`. Absent and unreadable filters are logged
/// as skips and never turned into errors.
pub fn check_filter<'a, I>(block_hash: BlockHash, filter: Option<&[u8]>, scripts: I) -> FilterCheck
where
    I: IntoIterator<Item = &'a ScriptBuf>,
{
    let Some(raw) = filter else {
        debug!(%block_hash, "no regular filter, skipping block");
        return FilterCheck::Absent;
    };
    match filter_matches_any(block_hash, raw, scripts) {
        Ok(true) => FilterCheck::Hit,
        Ok(false) => FilterCheck::Miss,
        Err(e) => {
            debug!(%block_hash, error = %e, "unreadable filter, skipping block");
            FilterCheck::Unreadable
        }
    }
}

/// True if any of `scripts` may appear in the block. A missing or broken
/// filter counts as "no match".
pub fn matches_any<'a, I>(filter: Option<&[u8]>, block_hash: BlockHash, scripts: I) -> bool
where
    I: IntoIterator<Item = &'a ScriptBuf>,
{
    check_filter(block_hash, filter, scripts).is_hit()
}

/// Address flavoured [`matches_any`].
pub fn matches_any_address<'a, I>(filter: Option<&[u8]>, block_hash: BlockHash, addrs: I) -> bool
where
    I: IntoIterator<Item = &'a Address>,
{
    let scripts: Vec<ScriptBuf> = addrs.into_iter().map(|a| a.script_pubkey()).collect();
    matches_any(filter, block_hash, &scripts)
}
