//! In-memory set of unspent, tracked outputs.
use std::{
    collections::{HashMap, HashSet},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bitcoin::OutPoint;
use tracing::debug;

use crate::types::Utxo;

/// Outpoint-keyed UTXO set. Every mutation is a whole-record insert or delete
/// taken under one write lock, so readers never see half an `apply`.
#[derive(Default)]
pub struct UtxoLedger {
    utxos: RwLock<HashMap<OutPoint, Utxo>>,
}

impl UtxoLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every created output (replacing stale copies), then delete every
    /// spent outpoint. Applying the same pair twice is a no-op the second time.
    pub fn apply(&self, created: &HashMap<OutPoint, Utxo>, spent: &HashSet<OutPoint>) {
        let mut utxos = self.write();
        for (outpoint, utxo) in created {
            utxos.insert(*outpoint, utxo.clone());
        }
        let mut removed = 0usize;
        for outpoint in spent {
            if utxos.remove(outpoint).is_some() {
                removed += 1;
            }
        }
        debug!(
            created = created.len(),
            removed,
            held = utxos.len(),
            "ledger updated"
        );
    }

    /// Every held output owned by one of `addresses`. Order is unspecified.
    pub fn query<S: AsRef<str>>(&self, addresses: &[S]) -> Vec<Utxo> {
        let wanted: HashSet<&str> = addresses.iter().map(|a| a.as_ref()).collect();
        self.read()
            .values()
            .filter(|u| wanted.contains(u.address.as_str()))
            .cloned()
            .collect()
    }

    /// Track a single output outside of a scan.
    pub fn insert(&self, utxo: Utxo) {
        let outpoint = utxo.outpoint();
        self.write().insert(outpoint, utxo);
        debug!(%outpoint, "utxo added");
    }

    /// Forget a single output outside of a scan.
    pub fn remove(&self, outpoint: &OutPoint) -> Option<Utxo> {
        let removed = self.write().remove(outpoint);
        if removed.is_some() {
            debug!(%outpoint, "utxo removed");
        }
        removed
    }

    /// Held output at `outpoint`.
    pub fn get(&self, outpoint: &OutPoint) -> Option<Utxo> {
        self.read().get(outpoint).cloned()
    }

    /// Number of held outputs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<OutPoint, Utxo>> {
        self.utxos.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<OutPoint, Utxo>> {
        self.utxos.write().unwrap_or_else(PoisonError::into_inner)
    }
}
