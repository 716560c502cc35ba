#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! niebla-utxo: compact-filter (BIP-158) UTXO discovery and spend tracking.
//!
//! Addresses never leave the process: every block's regular filter is tested
//! locally against the watched scripts, and only matching blocks are downloaded.
//!
//! ## What you implement
//! - [`HeaderSource`]: current tip and block hash by height (validated chain).
//! - [`FilterSource`]: per-block regular filters and raw blocks.
//!
//! ## What the engine does
//! - Resolves watched addresses to output scripts once and caches them.
//! - Scans a height range, filter first, block on a hit, collecting created
//!   and spent outpoints; applies them to an in-memory ledger in one step.
//! - Answers single-outpoint "spent or unspent?" lookups with early exit.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use niebla_utxo::prelude::*;
//! use bitcoin::{BlockHash, Network};
//! use async_trait::async_trait;
//!
//! struct MySource;
//! #[async_trait]
//! impl FilterSource for MySource {
//!     async fn get_cfilter(&self, _block: BlockHash) -> anyhow::Result<Option<Vec<u8>>> { Ok(None) }
//!     async fn get_block(&self, _block: BlockHash) -> anyhow::Result<Vec<u8>> { Ok(vec![]) }
//! }
//!
//! struct MyHeaders;
//! #[async_trait]
//! impl HeaderSource for MyHeaders {
//!     async fn tip_height(&self) -> anyhow::Result<u32> { Ok(0) }
//!     async fn hash_at_height(&self, _h: u32) -> anyhow::Result<BlockHash> {
//!         anyhow::bail!("empty chain")
//!     }
//! }
//!
//! async fn run() -> anyhow::Result<()> {
//!     let tracker = UtxoTracker::new(EngineConfig::for_network(Network::Bitcoin), MySource, MyHeaders);
//!     let addrs = ["bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"];
//!     tracker.rescan(800_000, &addrs)?.wait().await?;
//!     let utxos = tracker.get_utxos(&addrs)?;
//!     println!("{} utxos", utxos.len());
//!     Ok(())
//! }
//! ```
/// Cooperative cancellation for scans.
pub mod cancel;

/// Engine parameters.
pub mod config;

/// Tracker facade: watch, rescan, query, look up.
pub mod engine;

/// Error types.
pub mod error;

/// Traits for fetching compact filters and blocks.
pub mod filter_source;

/// Block header lookup abstraction (height → hash).
pub mod headers;

/// In-memory UTXO set.
pub mod ledger;

/// Single-outpoint spend lookup.
pub mod lookup;

/// BIP-158 filter tests.
pub mod matcher;

/// Watched addresses and scripts.
pub mod registry;

/// Range scan over compact filters.
pub mod scanner;

/// Outputs and spend reports.
pub mod types;

// Public re-exports
pub use config::EngineConfig;
pub use engine::{RescanHandle, RescanSummary, UtxoTracker};
pub use error::ScanError;
pub use filter_source::FilterSource;
pub use headers::HeaderSource;
pub use ledger::UtxoLedger;
pub use registry::{AddressRegistry, WatchSet};
pub use types::{SpendReport, Utxo};

/// Convenience prelude for end users.
pub mod prelude {
    pub use crate::{
        cancel::CancelToken, EngineConfig, FilterSource, HeaderSource, ScanError, SpendReport,
        Utxo, UtxoTracker,
    };
}
