//! Withdrawals awaiting signatures

use super::worker::WithdrawalDetails;
use super::WithdrawalError;
use crate::core::UnsignedWithdrawalTx;
use crate::multisig::short_tx_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A withdrawal request together with the transaction built for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedWithdrawal {
    pub details: WithdrawalDetails,
    pub tx: UnsignedWithdrawalTx,
}

/// Withdrawals this node has built and published signatures for,
/// keyed by short transaction hash
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UnsignedTransactions {
    transactions: BTreeMap<String, UnsignedWithdrawal>,
}

impl UnsignedTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a withdrawal until it is finalized. Returns its short hash.
    pub fn mark_as_unsigned(
        &mut self,
        details: WithdrawalDetails,
        tx: UnsignedWithdrawalTx,
    ) -> String {
        let tx_hash = tx.tx_hash();
        let key = short_tx_hash(&tx_hash).to_string();
        log::info!("Tx {} was added to the unsigned transactions list", tx_hash);
        self.transactions
            .insert(key.clone(), UnsignedWithdrawal { details, tx });
        key
    }

    /// Look up by full or short transaction hash
    pub fn get(&self, tx_hash: &str) -> Option<&UnsignedWithdrawal> {
        self.transactions.get(short_tx_hash(tx_hash))
    }

    /// Stop tracking a withdrawal, typically once it is broadcast
    pub fn remove(&mut self, tx_hash: &str) -> Option<UnsignedWithdrawal> {
        self.transactions.remove(short_tx_hash(tx_hash))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnsignedWithdrawal> {
        self.transactions.values()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), WithdrawalError> {
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load from file, or start empty if the file is absent
    pub fn load(path: &Path) -> Result<Self, WithdrawalError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
