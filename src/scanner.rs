//! Height-by-height filter scan that collects created and spent outpoints.
//!
//! For each height in `[start, end]`, ascending:
//! 1) resolve the block hash,
//! 2) pull the regular filter and test it against every watched script at once,
//! 3) on a hit, fetch the block and walk its transactions in block order.
//!
//! Any per-height failure skips that height; the skip is logged and reported
//! back in [`ScanOutcome::skipped`].
use std::collections::{HashMap, HashSet};

use bitcoin::{consensus, Block, BlockHash, OutPoint, ScriptBuf};
use tracing::{debug, info, warn};

use crate::{
    cancel::CancelToken,
    error::{Result, ScanError},
    filter_source::FilterSource,
    headers::HeaderSource,
    matcher::{check_filter, FilterCheck},
    registry::WatchSet,
    types::Utxo,
};

/// Why a height contributed nothing to a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Header index has no hash for the height.
    NoBlockHash,
    /// No regular filter available (or fetching it failed).
    NoFilter,
    /// Filter bytes did not decode.
    FilterUnreadable,
    /// Filter hit, but the block could not be fetched.
    BlockUnavailable,
    /// Filter hit, but the block bytes did not decode.
    BlockUndecodable,
}

/// A height that was not scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedHeight {
    /// Skipped height.
    pub height: u32,
    /// What went wrong.
    pub reason: SkipReason,
}

/// Result of scanning one range, before it touches the ledger.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Watched outputs created in the range and not spent within it.
    pub created: HashMap<OutPoint, Utxo>,
    /// Every outpoint consumed by an input of a matched block.
    pub spent: HashSet<OutPoint>,
    /// Heights that could not be scanned.
    pub skipped: Vec<SkippedHeight>,
    /// Number of blocks whose filter matched and that were walked.
    pub matched_blocks: u32,
}

impl ScanOutcome {
    /// True if every height of the range was scanned.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Drop outputs that were both created and spent inside the range.
    fn reconcile(&mut self) {
        let spent = &self.spent;
        self.created.retain(|outpoint, _| !spent.contains(outpoint));
    }
}

/// What one height yielded.
pub(crate) enum Probe {
    /// Filter says none of the scripts are in the block.
    Miss,
    /// Height could not be scanned.
    Skipped(SkipReason),
    /// Filter hit; the decoded block.
    Hit(BlockHash, Block),
}

/// Filter-driven range scanner over borrowed collaborators.
pub struct BlockScanner<'a, F, H> {
    source: &'a F,
    headers: &'a H,
    progress_interval: u32,
}

impl<'a, F, H> BlockScanner<'a, F, H>
where
    F: FilterSource,
    H: HeaderSource,
{
    /// Scanner reading from `source` and `headers`.
    pub fn new(source: &'a F, headers: &'a H) -> Self {
        Self {
            source,
            headers,
            progress_interval: 0,
        }
    }

    /// Log progress every `every` heights (0 disables).
    pub fn with_progress_interval(mut self, every: u32) -> Self {
        self.progress_interval = every;
        self
    }

    /// Scan `[start, end]` for outputs paying to `watch` and for every spent
    /// outpoint. An outpoint both created and spent inside the range is
    /// dropped from `created` but kept in `spent`.
    ///
    /// # Errors
    /// [`ScanError::NoScripts`] for an empty watch set and
    /// [`ScanError::Cancelled`] if `cancel` fires. Per-height failures are
    /// not errors.
    pub async fn scan(
        &self,
        start: u32,
        end: u32,
        watch: &WatchSet,
        cancel: &CancelToken,
    ) -> Result<ScanOutcome> {
        if watch.is_empty() {
            return Err(ScanError::NoScripts);
        }
        let scripts: Vec<ScriptBuf> = watch.scripts().cloned().collect();
        info!(start, end, scripts = scripts.len(), "scanning blocks");

        let mut out = ScanOutcome::default();
        if start > end {
            return Ok(out);
        }

        for height in start..=end {
            if cancel.is_cancelled() {
                info!(height, "scan cancelled");
                return Err(ScanError::Cancelled { height });
            }
            if self.progress_interval > 0 && (height - start) % self.progress_interval == 0 {
                debug!(height, end, "scan progress");
            }

            let (block_hash, block) = match self.probe(height, &scripts).await {
                Probe::Miss => continue,
                Probe::Skipped(reason) => {
                    out.skipped.push(SkippedHeight { height, reason });
                    continue;
                }
                Probe::Hit(hash, block) => (hash, block),
            };
            out.matched_blocks += 1;

            // Block order matters: a same-block spend always follows its creation.
            for tx in &block.txdata {
                for input in &tx.input {
                    out.spent.insert(input.previous_output);
                }

                let txid = tx.compute_txid();
                for (vout, txout) in tx.output.iter().enumerate() {
                    let Some(address) = watch.address_for(&txout.script_pubkey) else {
                        continue;
                    };
                    let utxo = Utxo {
                        txid,
                        vout: vout as u32,
                        value: txout.value,
                        address: address.to_string(),
                        script_pubkey: txout.script_pubkey.clone(),
                        height,
                    };
                    info!(
                        outpoint = %utxo.outpoint(),
                        value = utxo.value.to_sat(),
                        address,
                        %block_hash,
                        "found utxo"
                    );
                    out.created.insert(utxo.outpoint(), utxo);
                }
            }
        }

        let found = out.created.len();
        out.reconcile();
        info!(
            start,
            end,
            found,
            unspent = out.created.len(),
            spent = out.spent.len(),
            skipped = out.skipped.len(),
            matched = out.matched_blocks,
            "scan complete"
        );
        Ok(out)
    }

    /// Resolve, filter-test and (on a hit) fetch the block at `height`.
    pub(crate) async fn probe(&self, height: u32, scripts: &[ScriptBuf]) -> Probe {
        let block_hash = match self.headers.hash_at_height(height).await {
            Ok(hash) => hash,
            Err(e) => {
                debug!(height, error = %e, "no block hash, skipping height");
                return Probe::Skipped(SkipReason::NoBlockHash);
            }
        };

        let raw_filter = match self.source.get_cfilter(block_hash).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(height, %block_hash, error = %e, "filter fetch failed, skipping height");
                None
            }
        };

        match check_filter(block_hash, raw_filter.as_deref(), scripts) {
            FilterCheck::Hit => {}
            FilterCheck::Miss => return Probe::Miss,
            FilterCheck::Absent => return Probe::Skipped(SkipReason::NoFilter),
            FilterCheck::Unreadable => return Probe::Skipped(SkipReason::FilterUnreadable),
        }

        debug!(height, %block_hash, "filter matched, fetching block");
        let raw_block = match self.source.get_block(block_hash).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(height, %block_hash, error = %e, "block fetch failed, skipping height");
                return Probe::Skipped(SkipReason::BlockUnavailable);
            }
        };

        match consensus::encode::deserialize::<Block>(&raw_block) {
            Ok(block) => Probe::Hit(block_hash, block),
            Err(e) => {
                warn!(height, %block_hash, error = %e, "block decode failed, skipping height");
                Probe::Skipped(SkipReason::BlockUndecodable)
            }
        }
    }
}
