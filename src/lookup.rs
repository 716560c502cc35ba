//! Single-outpoint lookup: "does this output still exist, and if not, what spent it?"
//!
//! Same per-height loop as the range scan, restricted to the one script that
//! owns the outpoint, stopping as soon as both the creation and the spend have
//! been seen. The cost is bounded only by the caller-supplied start height:
//! every height between it and the end costs a filter round-trip (and a block
//! download on a hit), so callers should start at or just before the block that
//! created the output.
use bitcoin::{OutPoint, ScriptBuf, Transaction, Txid};
use tracing::{info, warn};

use crate::{
    cancel::CancelToken,
    error::{Result, ScanError},
    filter_source::FilterSource,
    headers::HeaderSource,
    scanner::{BlockScanner, Probe},
    types::SpendReport,
};

struct Creation {
    tx: Transaction,
    height: u32,
}

struct Spend {
    txid: Txid,
    input: u32,
    height: u32,
}

/// Point lookup over borrowed collaborators.
pub struct PointLookup<'a, F, H> {
    scanner: BlockScanner<'a, F, H>,
}

impl<'a, F, H> PointLookup<'a, F, H>
where
    F: FilterSource,
    H: HeaderSource,
{
    /// Lookup reading from `source` and `headers`.
    pub fn new(source: &'a F, headers: &'a H) -> Self {
        Self {
            scanner: BlockScanner::new(source, headers),
        }
    }

    /// Walk `[start, end]` looking for the creation of `target` (paying to
    /// `script`) and its spend.
    ///
    /// # Errors
    /// [`ScanError::NotFound`] if the creating transaction is not seen in the
    /// range, [`ScanError::Cancelled`] if `cancel` fires first.
    pub async fn lookup(
        &self,
        target: OutPoint,
        script: &ScriptBuf,
        start: u32,
        end: u32,
        cancel: &CancelToken,
    ) -> Result<SpendReport> {
        let scripts = std::slice::from_ref(script);
        let mut creation: Option<Creation> = None;
        let mut spend: Option<Spend> = None;
        let mut skipped = 0usize;

        if start <= end {
            'heights: for height in start..=end {
                if cancel.is_cancelled() {
                    return Err(ScanError::Cancelled { height });
                }

                let block = match self.scanner.probe(height, scripts).await {
                    Probe::Hit(_, block) => block,
                    Probe::Miss => continue,
                    Probe::Skipped(_) => {
                        skipped += 1;
                        continue;
                    }
                };

                for tx in block.txdata {
                    let txid = tx.compute_txid();

                    if creation.is_none()
                        && txid == target.txid
                        && (target.vout as usize) < tx.output.len()
                    {
                        info!(outpoint = %target, height, "found utxo creation");
                        creation = Some(Creation { tx, height });
                        continue;
                    }

                    if creation.is_some() {
                        let hit = tx
                            .input
                            .iter()
                            .position(|input| input.previous_output == target);
                        if let Some(input) = hit {
                            info!(outpoint = %target, height, spending_txid = %txid, "found utxo spend");
                            spend = Some(Spend {
                                txid,
                                input: input as u32,
                                height,
                            });
                            break 'heights;
                        }
                    }
                }
            }
        }

        if skipped > 0 {
            // A missed filter or block may hide the creation or the spend.
            warn!(
                outpoint = %target,
                start_height = start,
                end_height = end,
                skipped,
                "lookup finished with skipped heights"
            );
        }

        let Some(creation) = creation else {
            return Err(ScanError::NotFound {
                outpoint: target,
                start_height: start,
            });
        };

        let report = match spend {
            Some(s) => SpendReport::Spent {
                spending_txid: s.txid,
                spending_input: s.input,
                spending_height: s.height,
            },
            None => {
                let txout = &creation.tx.output[target.vout as usize];
                SpendReport::Unspent {
                    value: txout.value,
                    script_pubkey: txout.script_pubkey.clone(),
                    height: creation.height,
                }
            }
        };
        info!(
            outpoint = %target,
            created_at = creation.height,
            unspent = report.is_unspent(),
            "utxo lookup complete"
        );
        Ok(report)
    }
}
