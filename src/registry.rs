//! Watched addresses and their output scripts.
use std::{
    collections::HashMap,
    str::FromStr,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bitcoin::{Address, Network, Script, ScriptBuf};
use tracing::debug;

use crate::error::{Result, ScanError};

/// Decode `address` for `network` and build its scriptPubKey.
pub fn decode_address(address: &str, network: Network) -> Result<ScriptBuf> {
    canonicalize(address, network).map(|(_, script)| script)
}

/// Decode `address` for `network`, returning its canonical spelling and scriptPubKey.
///
/// Bech32 addresses are accepted in either case; the canonical form is the
/// lower-case encoding.
pub fn canonicalize(address: &str, network: Network) -> Result<(String, ScriptBuf)> {
    let invalid = |reason: String| ScanError::InvalidAddress {
        address: address.to_string(),
        reason,
    };
    let parsed = Address::from_str(address).map_err(|e| invalid(e.to_string()))?;
    let checked = parsed
        .require_network(network)
        .map_err(|e| invalid(e.to_string()))?;
    Ok((checked.to_string(), checked.script_pubkey()))
}

#[derive(Default)]
struct Watched {
    /// Canonical address -> script.
    scripts: HashMap<String, ScriptBuf>,
    /// Every spelling seen so far -> canonical address.
    spellings: HashMap<String, String>,
}

impl Watched {
    fn get(&self, spelling: &str) -> Option<(String, ScriptBuf)> {
        let canonical = self.spellings.get(spelling)?;
        let script = self.scripts.get(canonical)?;
        Some((canonical.clone(), script.clone()))
    }
}

/// Address -> script cache keyed by canonical address. Each unique address
/// string is decoded once; other spellings of a watched address map onto it.
pub struct AddressRegistry {
    network: Network,
    watched: RwLock<Watched>,
}

impl AddressRegistry {
    /// Empty registry for `network`.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            watched: RwLock::new(Watched::default()),
        }
    }

    /// Network addresses are decoded for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Start watching `address`. Registering twice, under any spelling, is a no-op.
    pub fn register(&self, address: &str) -> Result<ScriptBuf> {
        self.register_canonical(address).map(|(_, script)| script)
    }

    /// Register `address` and return its canonical spelling with its script.
    pub fn register_canonical(&self, address: &str) -> Result<(String, ScriptBuf)> {
        if let Some(hit) = self.read().get(address) {
            return Ok(hit);
        }

        let mut watched = self.write();
        if let Some(hit) = watched.get(address) {
            return Ok(hit);
        }
        let (canonical, script) = canonicalize(address, self.network)?;
        if !watched.scripts.contains_key(&canonical) {
            debug!(address = %canonical, script = %hex::encode(script.as_bytes()), "watching address");
            watched.scripts.insert(canonical.clone(), script.clone());
            watched
                .spellings
                .insert(canonical.clone(), canonical.clone());
        }
        if canonical != address {
            debug!(spelling = address, address = %canonical, "address alias");
        }
        watched
            .spellings
            .insert(address.to_string(), canonical.clone());
        Ok((canonical, script))
    }

    /// Register every address and return their canonical spellings, deduplicated.
    pub fn register_all<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::with_capacity(addresses.len());
        for address in addresses {
            let (canonical, _) = self.register_canonical(address.as_ref())?;
            if !out.contains(&canonical) {
                out.push(canonical);
            }
        }
        Ok(out)
    }

    /// Script of a registered address.
    pub fn script_for(&self, address: &str) -> Result<ScriptBuf> {
        self.read()
            .get(address)
            .map(|(_, script)| script)
            .ok_or_else(|| ScanError::NotRegistered(address.to_string()))
    }

    /// Script for `address` without adding it to the watch list.
    pub fn resolve(&self, address: &str) -> Result<ScriptBuf> {
        match self.read().get(address) {
            Some((_, script)) => Ok(script),
            None => decode_address(address, self.network),
        }
    }

    /// Register every address and return the set to scan for, owned by the
    /// canonical spellings. Fails on the first malformed address; earlier ones
    /// stay registered.
    pub fn watch_set<S: AsRef<str>>(&self, addresses: &[S]) -> Result<WatchSet> {
        let mut set = WatchSet::default();
        for address in addresses {
            let (canonical, script) = self.register_canonical(address.as_ref())?;
            set.insert(script, canonical);
        }
        Ok(set)
    }

    /// All watched addresses in canonical form, in no particular order.
    pub fn addresses(&self) -> Vec<String> {
        self.read().scripts.keys().cloned().collect()
    }

    /// Number of watched addresses.
    pub fn len(&self) -> usize {
        self.read().scripts.len()
    }

    /// True when nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Watched> {
        self.watched.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Watched> {
        self.watched.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scripts handed to a scan, each tagged with the address that owns it.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    by_script: HashMap<ScriptBuf, String>,
}

impl WatchSet {
    /// Add `script` owned by `address`. A script listed twice keeps its first owner.
    pub fn insert(&mut self, script: ScriptBuf, address: String) {
        self.by_script.entry(script).or_insert(address);
    }

    /// Owning address if `script` is watched.
    pub fn address_for(&self, script: &Script) -> Option<&str> {
        self.by_script.get(script).map(String::as_str)
    }

    /// Watched scripts.
    pub fn scripts(&self) -> impl Iterator<Item = &ScriptBuf> {
        self.by_script.keys()
    }

    /// Number of distinct scripts.
    pub fn len(&self) -> usize {
        self.by_script.len()
    }

    /// True when there is nothing to scan for.
    pub fn is_empty(&self) -> bool {
        self.by_script.is_empty()
    }
}

impl FromIterator<(ScriptBuf, String)> for WatchSet {
    fn from_iter<T: IntoIterator<Item = (ScriptBuf, String)>>(iter: T) -> Self {
        let mut set = Self::default();
        for (script, address) in iter {
            set.insert(script, address);
        }
        set
    }
}
