//! Shared fixtures: an in-memory chain with real BIP-158 filters.
#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::{
    bip158::{BlockFilter, Error as BfError},
    block::{Header as BlockHeader, Version as BlockVersion},
    consensus,
    hash_types::TxMerkleNode,
    hashes::Hash,
    pow::CompactTarget,
    Address, Amount, Block, BlockHash, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, WPubkeyHash, Witness,
};
use niebla_utxo::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Regtest P2WPKH address derived from `seed`, with its script.
pub fn address(seed: u8) -> (String, ScriptBuf) {
    let script = ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([seed; 20]));
    let addr = Address::from_script(&script, Network::Regtest).expect("p2wpkh is standard");
    (addr.to_string(), script)
}

/// Transaction paying `outputs`, funded from a made-up prevout unique to `seed`.
pub fn funding_tx(seed: u8, outputs: &[(&ScriptBuf, u64)]) -> Transaction {
    let input = TxIn {
        previous_output: OutPoint {
            txid: Txid::from_byte_array([seed; 32]),
            vout: 7,
        },
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    };
    tx(vec![input], outputs)
}

/// Transaction spending `prevs` (in order) into `outputs`.
pub fn spend_tx(prevs: &[OutPoint], outputs: &[(&ScriptBuf, u64)]) -> Transaction {
    let inputs = prevs
        .iter()
        .map(|prev| TxIn {
            previous_output: *prev,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        })
        .collect();
    tx(inputs, outputs)
}

fn tx(input: Vec<TxIn>, outputs: &[(&ScriptBuf, u64)]) -> Transaction {
    Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input,
        output: outputs
            .iter()
            .map(|(script, sat)| TxOut {
                value: Amount::from_sat(*sat),
                script_pubkey: (*script).clone(),
            })
            .collect(),
    }
}

fn coinbase(height: u32) -> Transaction {
    let input = TxIn {
        previous_output: OutPoint::null(),
        script_sig: ScriptBuf::from_bytes(height.to_le_bytes().to_vec()),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    };
    let miner = ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([0xEE; 20]));
    tx(vec![input], &[(&miner, 50 * 100_000_000)])
}

/// Builds a [`MemChain`]. Every block gets a coinbase in front of the given
/// transactions, so BIP-158 input scripts of those transactions are indexed.
#[derive(Default)]
pub struct ChainBuilder {
    blocks: BTreeMap<u32, Vec<Transaction>>,
    no_filter: HashSet<u32>,
    bad_filter: HashSet<u32>,
    tip: Option<u32>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, height: u32, txs: Vec<Transaction>) -> Self {
        self.blocks.insert(height, txs);
        self
    }

    /// Serve no filter for `height`.
    pub fn without_filter(mut self, height: u32) -> Self {
        self.no_filter.insert(height);
        self
    }

    /// Serve garbage filter bytes for `height`.
    pub fn with_bad_filter(mut self, height: u32) -> Self {
        self.bad_filter.insert(height);
        self
    }

    /// Override the reported tip (defaults to the highest block).
    pub fn tip(mut self, height: u32) -> Self {
        self.tip = Some(height);
        self
    }

    pub fn build(self) -> MemChain {
        let mut blocks = BTreeMap::new();
        let mut prev = BlockHash::all_zeros();
        for (height, txs) in &self.blocks {
            let mut txdata = vec![coinbase(*height)];
            txdata.extend(txs.iter().cloned());
            let header = BlockHeader {
                version: BlockVersion::from_consensus(2),
                prev_blockhash: prev,
                merkle_root: TxMerkleNode::all_zeros(),
                time: *height,
                bits: CompactTarget::from_consensus(0x207fffff),
                nonce: *height,
            };
            let block = Block { header, txdata };
            prev = block.block_hash();
            blocks.insert(*height, block);
        }

        // Every output of the fixture, so spends resolve their prevout scripts.
        let prevouts: HashMap<OutPoint, ScriptBuf> = blocks
            .values()
            .flat_map(|b| b.txdata.iter())
            .flat_map(|tx| {
                let txid = tx.compute_txid();
                tx.output
                    .iter()
                    .enumerate()
                    .map(move |(vout, out)| (OutPoint::new(txid, vout as u32), out.script_pubkey.clone()))
            })
            .collect();

        let mut stored = BTreeMap::new();
        let mut heights = HashMap::new();
        for (height, block) in blocks {
            let filter = if self.no_filter.contains(&height) {
                None
            } else if self.bad_filter.contains(&height) {
                Some(vec![0x05])
            } else {
                let bf = BlockFilter::new_script_filter(
                    &block,
                    |op: &OutPoint| -> Result<ScriptBuf, BfError> {
                        Ok(prevouts.get(op).cloned().unwrap_or_default())
                    },
                )
                .expect("filter builds");
                Some(bf.content)
            };
            let hash = block.block_hash();
            heights.insert(hash, height);
            stored.insert(
                height,
                StoredBlock {
                    hash,
                    raw: consensus::encode::serialize(&block),
                    filter,
                },
            );
        }

        let tip = self
            .tip
            .or_else(|| stored.keys().next_back().copied())
            .unwrap_or(0);
        MemChain {
            inner: Arc::new(ChainData {
                blocks: stored,
                heights,
                tip,
                calls: AtomicUsize::new(0),
                block_fetches: AtomicUsize::new(0),
                probed: Mutex::new(Vec::new()),
            }),
        }
    }
}

struct StoredBlock {
    hash: BlockHash,
    raw: Vec<u8>,
    filter: Option<Vec<u8>>,
}

struct ChainData {
    blocks: BTreeMap<u32, StoredBlock>,
    heights: HashMap<BlockHash, u32>,
    tip: u32,
    calls: AtomicUsize,
    block_fetches: AtomicUsize,
    probed: Mutex<Vec<u32>>,
}

/// In-memory header index + filter/block source. Clones share state.
#[derive(Clone)]
pub struct MemChain {
    inner: Arc<ChainData>,
}

impl MemChain {
    /// Hash of the block stored at `height`.
    pub fn hash_at(&self, height: u32) -> BlockHash {
        self.inner.blocks[&height].hash
    }

    /// Raw filter bytes stored at `height`.
    pub fn filter_at(&self, height: u32) -> Option<Vec<u8>> {
        self.inner.blocks[&height].filter.clone()
    }

    /// Every collaborator call so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Full block downloads so far.
    pub fn block_fetches(&self) -> usize {
        self.inner.block_fetches.load(Ordering::SeqCst)
    }

    /// Heights asked of the header index, in order.
    pub fn probed_heights(&self) -> Vec<u32> {
        self.inner.probed.lock().unwrap().clone()
    }

    fn tick(&self) {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HeaderSource for MemChain {
    async fn tip_height(&self) -> anyhow::Result<u32> {
        self.tick();
        Ok(self.inner.tip)
    }

    async fn hash_at_height(&self, height: u32) -> anyhow::Result<BlockHash> {
        self.tick();
        self.inner.probed.lock().unwrap().push(height);
        match self.inner.blocks.get(&height) {
            Some(b) => Ok(b.hash),
            None => anyhow::bail!("no block at height {height}"),
        }
    }
}

#[async_trait]
impl FilterSource for MemChain {
    async fn get_cfilter(&self, block: BlockHash) -> anyhow::Result<Option<Vec<u8>>> {
        self.tick();
        let Some(height) = self.inner.heights.get(&block) else {
            anyhow::bail!("unknown block {block}");
        };
        Ok(self.inner.blocks[height].filter.clone())
    }

    async fn get_block(&self, block: BlockHash) -> anyhow::Result<Vec<u8>> {
        self.tick();
        self.inner.block_fetches.fetch_add(1, Ordering::SeqCst);
        let Some(height) = self.inner.heights.get(&block) else {
            anyhow::bail!("unknown block {block}");
        };
        Ok(self.inner.blocks[height].raw.clone())
    }
}

/// Tracker over a regtest chain.
pub fn tracker(chain: &MemChain) -> UtxoTracker<MemChain, MemChain> {
    init_tracing();
    UtxoTracker::new(
        EngineConfig::for_network(Network::Regtest),
        chain.clone(),
        chain.clone(),
    )
}
