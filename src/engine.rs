//! Orchestrator for compact-filter UTXO tracking:
//! 1) resolve watched addresses to scripts,
//! 2) scan per-block filters over a height range and collect creations/spends,
//! 3) fold the result into the ledger in one step, or answer single-outpoint lookups.
use std::{str::FromStr, sync::Arc};

use bitcoin::{OutPoint, ScriptBuf, Txid};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    cancel::{cancel_pair, CancelToken, CancelTrigger},
    config::EngineConfig,
    error::{Result, ScanError},
    filter_source::FilterSource,
    headers::HeaderSource,
    ledger::UtxoLedger,
    lookup::PointLookup,
    registry::{AddressRegistry, WatchSet},
    scanner::{BlockScanner, SkippedHeight},
    types::{SpendReport, Utxo},
};

/// What a finished rescan did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescanSummary {
    /// First scanned height.
    pub start_height: u32,
    /// Last scanned height.
    pub end_height: u32,
    /// Outputs inserted (created and still unspent at the end of the range).
    pub created: usize,
    /// Spent outpoints observed in matched blocks (deletions requested). Most
    /// were never held by the ledger.
    pub spent: usize,
    /// Heights that could not be scanned; the result is partial when non-empty.
    pub skipped: Vec<SkippedHeight>,
    /// Blocks whose filter matched.
    pub matched_blocks: u32,
}

/// A rescan running in the background.
///
/// Dropping the handle leaves the rescan running; its outcome is then only
/// visible in the logs and through later ledger queries.
pub struct RescanHandle {
    cancel: CancelTrigger,
    task: JoinHandle<Result<RescanSummary>>,
}

impl RescanHandle {
    /// Stop the rescan before its next height. Nothing is applied to the ledger.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the task has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the rescan to finish.
    pub async fn wait(self) -> Result<RescanSummary> {
        self.task.await?
    }
}

/// UTXO tracker. `F` = filter/block source, `H` = header index.
///
/// Owns the address registry and the ledger; cloning shares them.
pub struct UtxoTracker<F, H> {
    config: EngineConfig,
    source: Arc<F>,
    headers: Arc<H>,
    registry: Arc<AddressRegistry>,
    ledger: Arc<UtxoLedger>,
}

impl<F, H> Clone for UtxoTracker<F, H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            source: Arc::clone(&self.source),
            headers: Arc::clone(&self.headers),
            registry: Arc::clone(&self.registry),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<F, H> UtxoTracker<F, H>
where
    F: FilterSource + 'static,
    H: HeaderSource + 'static,
{
    /// Create a tracker with an empty watch list and ledger.
    pub fn new(config: EngineConfig, source: F, headers: H) -> Self {
        Self {
            registry: Arc::new(AddressRegistry::new(config.network)),
            ledger: Arc::new(UtxoLedger::new()),
            config,
            source: Arc::new(source),
            headers: Arc::new(headers),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Watched addresses and their scripts.
    pub fn registry(&self) -> &Arc<AddressRegistry> {
        &self.registry
    }

    /// Currently known unspent outputs.
    pub fn ledger(&self) -> &Arc<UtxoLedger> {
        &self.ledger
    }

    /// Start watching `address`.
    ///
    /// # Errors
    /// [`ScanError::InvalidAddress`] if it does not decode for the configured network.
    pub fn watch_address(&self, address: &str) -> Result<()> {
        self.registry.register(address).map(|_| ())
    }

    /// Watched addresses in canonical form, in no particular order.
    pub fn watched_addresses(&self) -> Vec<String> {
        self.registry.addresses()
    }

    /// Known unspent outputs of `addresses`, registering any that are new.
    /// Newly registered addresses have no outputs until a rescan covers them.
    /// Any spelling of an address (e.g. upper-case bech32) returns the same
    /// outputs; [`Utxo::address`] always carries the canonical form.
    pub fn get_utxos<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<Utxo>> {
        let canonical = self.registry.register_all(addresses)?;
        let utxos = self.ledger.query(&canonical);
        info!(
            utxos = utxos.len(),
            addresses = addresses.len(),
            "returning utxos"
        );
        Ok(utxos)
    }

    /// Rescan `[start_height, tip]` for `addresses` in the background.
    ///
    /// Addresses are registered before this returns, so malformed input fails
    /// here. The scan itself runs on a tokio task; the returned handle can
    /// cancel it or wait for its summary.
    ///
    /// # Errors
    /// [`ScanError::InvalidAddress`], [`ScanError::NoScripts`] for an empty
    /// watch set, [`ScanError::NoRuntime`] when called outside a tokio runtime.
    pub fn rescan<S: AsRef<str>>(&self, start_height: u32, addresses: &[S]) -> Result<RescanHandle> {
        let runtime = Handle::try_current().map_err(|_| ScanError::NoRuntime)?;
        let watch = self.registry.watch_set(addresses)?;
        if watch.is_empty() {
            return Err(ScanError::NoScripts);
        }

        let (trigger, token) = cancel_pair();
        let this = self.clone();
        let task = runtime.spawn(async move {
            let res = this.rescan_to_tip(start_height, &watch, &token).await;
            if let Err(e) = &res {
                warn!(start_height, error = %e, "rescan failed");
            }
            res
        });

        info!(start_height, addresses = addresses.len(), "rescan started");
        Ok(RescanHandle {
            cancel: trigger,
            task,
        })
    }

    /// Scan `[start_height, end_height]` for `addresses` and apply the result,
    /// returning once the ledger has been updated.
    pub async fn scan_and_apply<S: AsRef<str>>(
        &self,
        start_height: u32,
        end_height: u32,
        addresses: &[S],
        cancel: &CancelToken,
    ) -> Result<RescanSummary> {
        let watch = self.registry.watch_set(addresses)?;
        self.scan_range(start_height, end_height, &watch, cancel).await
    }

    /// Report whether `txid:vout`, paying to `address`, is still unspent.
    ///
    /// Scans from `start_height` to the current tip. Every height in between
    /// costs a filter round-trip, so pass the creation height (or slightly
    /// less); scanning from genesis is very slow. The call blocks for the whole
    /// scan; wrap it in a timeout or pass a cancel token via
    /// [`Self::get_utxo_in_range`].
    ///
    /// # Errors
    /// [`ScanError::MissingAddress`] for an empty address (checked before any
    /// network access), [`ScanError::NotFound`] if the creating transaction is
    /// not in the scanned range.
    pub async fn get_utxo(
        &self,
        txid: &str,
        vout: u32,
        address: &str,
        start_height: u32,
    ) -> Result<SpendReport> {
        let (target, script) = self.lookup_target(txid, vout, address)?;
        let tip = self.headers.tip_height().await?;
        self.lookup(target, &script, start_height, tip, &CancelToken::never())
            .await
    }

    /// [`Self::get_utxo`] over an explicit `[start_height, end_height]`.
    pub async fn get_utxo_in_range(
        &self,
        txid: &str,
        vout: u32,
        address: &str,
        start_height: u32,
        end_height: u32,
        cancel: &CancelToken,
    ) -> Result<SpendReport> {
        let (target, script) = self.lookup_target(txid, vout, address)?;
        self.lookup(target, &script, start_height, end_height, cancel)
            .await
    }

    fn lookup_target(&self, txid: &str, vout: u32, address: &str) -> Result<(OutPoint, ScriptBuf)> {
        if address.is_empty() {
            return Err(ScanError::MissingAddress);
        }
        let script = self.registry.resolve(address)?;
        let txid = Txid::from_str(txid).map_err(|e| ScanError::InvalidTxid {
            txid: txid.to_string(),
            reason: e.to_string(),
        })?;
        Ok((OutPoint::new(txid, vout), script))
    }

    async fn lookup(
        &self,
        target: OutPoint,
        script: &ScriptBuf,
        start_height: u32,
        end_height: u32,
        cancel: &CancelToken,
    ) -> Result<SpendReport> {
        info!(outpoint = %target, start_height, end_height, "looking up utxo");
        PointLookup::new(&*self.source, &*self.headers)
            .lookup(target, script, start_height, end_height, cancel)
            .await
    }

    async fn rescan_to_tip(
        &self,
        start_height: u32,
        watch: &WatchSet,
        cancel: &CancelToken,
    ) -> Result<RescanSummary> {
        let tip = self.headers.tip_height().await?;
        self.scan_range(start_height, tip, watch, cancel).await
    }

    async fn scan_range(
        &self,
        start_height: u32,
        end_height: u32,
        watch: &WatchSet,
        cancel: &CancelToken,
    ) -> Result<RescanSummary> {
        let outcome = BlockScanner::new(&*self.source, &*self.headers)
            .with_progress_interval(self.config.progress_interval)
            .scan(start_height, end_height, watch, cancel)
            .await?;

        // Single logical update: queries see all of it or none of it.
        self.ledger.apply(&outcome.created, &outcome.spent);

        if !outcome.is_complete() {
            warn!(
                start_height,
                end_height,
                skipped = outcome.skipped.len(),
                "rescan finished with skipped heights"
            );
        }
        Ok(RescanSummary {
            start_height,
            end_height,
            created: outcome.created.len(),
            spent: outcome.spent.len(),
            skipped: outcome.skipped,
            matched_blocks: outcome.matched_blocks,
        })
    }
}
