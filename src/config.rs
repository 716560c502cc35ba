use bitcoin::Network;

use crate::error::{Result, ScanError};

/// Static parameters for an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Network addresses are decoded for. Addresses of any other network are rejected.
    pub network: Network,
    /// Log scan progress every `progress_interval` heights (0 disables).
    pub progress_interval: u32,
}

impl EngineConfig {
    /// Default progress logging cadence.
    pub const DEFAULT_PROGRESS_INTERVAL: u32 = 1_000;

    /// Configuration for the given network with default progress logging.
    pub const fn for_network(network: Network) -> Self {
        Self {
            network,
            progress_interval: Self::DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Parse a network name as used on the command line and in config files.
    pub fn from_network_name(name: &str) -> Result<Self> {
        let network = match name {
            "mainnet" => Network::Bitcoin,
            "testnet" => Network::Testnet,
            "signet" => Network::Signet,
            "regtest" => Network::Regtest,
            other => return Err(ScanError::UnknownNetwork(other.to_string())),
        };
        Ok(Self::for_network(network))
    }

    /// Override the progress logging cadence.
    pub fn with_progress_interval(mut self, every: u32) -> Self {
        self.progress_interval = every;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_network(Network::Bitcoin)
    }
}

impl From<Network> for EngineConfig {
    fn from(network: Network) -> Self {
        Self::for_network(network)
    }
}
