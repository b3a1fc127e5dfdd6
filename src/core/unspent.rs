//! Unspent outputs as observed by a notary's wallet

use crate::crypto::sha256_array;
use bitcoin::consensus::encode::serialize;
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, TxOut};
use serde::{Deserialize, Serialize};

/// An unspent transaction output together with its confirmation depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Previous transaction id and output index
    pub outpoint: OutPoint,
    /// Value in satoshis
    pub value: u64,
    /// Locking script of the output
    pub script_pubkey: ScriptBuf,
    /// Base58 address the output pays to
    pub address: String,
    /// Depth of the parent transaction in blocks
    pub confirmations: u32,
}

impl UnspentOutput {
    /// Create an unspent output paying `value` to `address`
    pub fn new(outpoint: OutPoint, value: u64, address: &Address, confirmations: u32) -> Self {
        Self {
            outpoint,
            value,
            script_pubkey: address.script_pubkey(),
            address: address.to_string(),
            confirmations,
        }
    }

    /// The output in consensus form
    pub fn txout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.value),
            script_pubkey: self.script_pubkey.clone(),
        }
    }

    /// Stable content hash used to order candidates.
    ///
    /// SHA-256 over the consensus encoding of the outpoint followed by the
    /// consensus encoding of the output. Every node observing the same chain
    /// computes the same key regardless of how its wallet stores unspents.
    pub fn sort_key(&self) -> [u8; 32] {
        let mut data = serialize(&self.outpoint);
        data.extend_from_slice(&serialize(&self.txout()));
        sha256_array(&data)
    }

    /// Check if this output pays to one of the given addresses
    pub fn is_paid_to_any(&self, addresses: &std::collections::HashSet<String>) -> bool {
        addresses.contains(&self.address)
    }
}

/// Sum of the values of the given outputs
pub fn total_value(unspents: &[UnspentOutput]) -> u64 {
    unspents.iter().map(|u| u.value).sum()
}
