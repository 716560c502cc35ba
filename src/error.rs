//! Error taxonomy for registration, scanning and point lookups.
use bitcoin::OutPoint;
use thiserror::Error;

/// Errors returned by the engine. All of them are scoped to the request that
/// triggered them; per-height fetch problems never show up here (they are
/// reported as [`crate::scanner::SkippedHeight`] instead).
#[derive(Debug, Error)]
pub enum ScanError {
    /// The address could not be decoded for the configured network.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// Address string as supplied by the caller.
        address: String,
        /// Decoder message.
        reason: String,
    },

    /// `script_for` was asked about an address nobody registered.
    #[error("address {0} is not registered")]
    NotRegistered(String),

    /// Point lookups match on scripts, so a bare outpoint is not enough.
    #[error("address is required: compact block filters match on scripts, not outpoints")]
    MissingAddress,

    /// The transaction id is not 64 hex characters.
    #[error("invalid txid {txid}: {reason}")]
    InvalidTxid {
        /// Txid string as supplied by the caller.
        txid: String,
        /// Parser message.
        reason: String,
    },

    /// The creating transaction was never observed in the scanned range.
    #[error(
        "utxo {outpoint} not found: ensure start_height ({start_height}) is at or before the block containing the transaction"
    )]
    NotFound {
        /// Outpoint that was looked up.
        outpoint: OutPoint,
        /// First height that was scanned.
        start_height: u32,
    },

    /// A scan was requested with nothing to look for.
    #[error("no valid scripts to scan for")]
    NoScripts,

    /// The scan was cancelled before reaching `height`. Nothing was committed.
    #[error("scan cancelled before height {height}")]
    Cancelled {
        /// First height that was not scanned.
        height: u32,
    },

    /// Network name not one of mainnet/testnet/signet/regtest.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// A background rescan was requested outside of a tokio runtime.
    #[error("rescan needs a running tokio runtime")]
    NoRuntime,

    /// A collaborator failed outside of the per-height loop (e.g. tip height).
    #[error(transparent)]
    Source(#[from] anyhow::Error),

    /// The background rescan task panicked or was aborted.
    #[error("rescan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience alias used across the crate.
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
