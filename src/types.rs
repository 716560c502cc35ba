use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};

/// A tracked, currently unspent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Creating transaction.
    pub txid: Txid,
    /// Output index within the creating transaction.
    pub vout: u32,
    /// Output value.
    pub value: Amount,
    /// Watched address the output pays to, as the caller supplied it.
    pub address: String,
    /// Output script.
    pub script_pubkey: ScriptBuf,
    /// Height of the creating block.
    pub height: u32,
}

impl Utxo {
    /// Ledger key.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }

    /// Hex encoded output script.
    pub fn script_hex(&self) -> String {
        hex::encode(self.script_pubkey.as_bytes())
    }
}

/// Answer of a single-outpoint lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendReport {
    /// The output exists and no spend was observed.
    Unspent {
        /// Output value.
        value: Amount,
        /// Output script.
        script_pubkey: ScriptBuf,
        /// Height of the creating block.
        height: u32,
    },
    /// The output was consumed.
    Spent {
        /// Spending transaction.
        spending_txid: Txid,
        /// Input index within the spending transaction.
        spending_input: u32,
        /// Height of the spending block.
        spending_height: u32,
    },
}

impl SpendReport {
    /// True for [`SpendReport::Unspent`].
    pub fn is_unspent(&self) -> bool {
        matches!(self, SpendReport::Unspent { .. })
    }
}
