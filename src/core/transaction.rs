//! Unsigned withdrawal transactions
//!
//! A withdrawal spends a set of multisig unspents to a destination and
//! returns any excess to the federation's change address:
//! - version 2, lock time 0
//! - every input has an empty script and sequence `0xFFFFFFFF`
//! - outputs are `[destination, change]`, the change output is omitted when zero

use super::unspent::{total_value, UnspentOutput};
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{
    absolute, transaction, Address, Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Witness,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Transaction version used for withdrawals
pub const TX_VERSION: transaction::Version = transaction::Version::TWO;

/// Sequence number used on every input
pub const SEQUENCE_FINAL: Sequence = Sequence::MAX;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Withdrawal has no inputs")]
    NoInputs,
    #[error("Inputs worth {available} cannot cover {required}")]
    InsufficientInputs { required: u64, available: u64 },
    #[error("Amount overflow")]
    Overflow,
}

// =============================================================================
// Unsigned Withdrawal
// =============================================================================

/// A withdrawal transaction awaiting signatures, with the outputs it spends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedWithdrawalTx {
    tx: Transaction,
    inputs: Vec<UnspentOutput>,
    amount: u64,
    fee: u64,
    change: u64,
}

impl UnsignedWithdrawalTx {
    /// Assemble a withdrawal spending `inputs` in the order given.
    ///
    /// The change is `sum(inputs) - amount - fee` and is paid to
    /// `change_address` only when positive.
    pub fn build(
        inputs: Vec<UnspentOutput>,
        destination: &Address,
        amount: u64,
        fee: u64,
        change_address: &Address,
    ) -> Result<Self, TransactionError> {
        if inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }

        let required = amount.checked_add(fee).ok_or(TransactionError::Overflow)?;
        let available = total_value(&inputs);
        if available < required {
            return Err(TransactionError::InsufficientInputs {
                required,
                available,
            });
        }
        let change = available - required;

        let input = inputs
            .iter()
            .map(|unspent| TxIn {
                previous_output: unspent.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: SEQUENCE_FINAL,
                witness: Witness::default(),
            })
            .collect();

        let mut output = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: destination.script_pubkey(),
        }];
        if change > 0 {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: change_address.script_pubkey(),
            });
        }

        let tx = Transaction {
            version: TX_VERSION,
            lock_time: absolute::LockTime::ZERO,
            input,
            output,
        };

        Ok(Self {
            tx,
            inputs,
            amount,
            fee,
            change,
        })
    }

    /// The transaction itself
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// The outputs being spent, in input order
    pub fn inputs(&self) -> &[UnspentOutput] {
        &self.inputs
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn change(&self) -> u64 {
        self.change
    }

    /// Total value of the spent outputs
    pub fn total_input(&self) -> u64 {
        total_value(&self.inputs)
    }

    /// Transaction id as a display string
    pub fn tx_hash(&self) -> String {
        self.tx.compute_txid().to_string()
    }

    /// Consensus serialization as hex
    pub fn raw_hex(&self) -> String {
        serialize_hex(&self.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{outpoint, p2pkh_address, p2sh_address};

    fn unspents(values: &[u64]) -> Vec<UnspentOutput> {
        let address = p2sh_address();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| UnspentOutput::new(outpoint(i as u64 + 1, 0), *v, &address, 6))
            .collect()
    }

    #[test]
    fn test_build_with_change() {
        let destination = p2pkh_address();
        let change_address = p2sh_address();
        let inputs = unspents(&[5_000, 9_000]);
        let unsigned =
            UnsignedWithdrawalTx::build(inputs, &destination, 10_000, 1_000, &change_address)
                .unwrap();

        let tx = unsigned.tx();
        assert_eq!(tx.version, transaction::Version::TWO);
        assert_eq!(tx.lock_time, absolute::LockTime::ZERO);
        assert_eq!(tx.input.len(), 2);
        assert!(tx.input.iter().all(|i| i.script_sig.is_empty()));
        assert!(tx.input.iter().all(|i| i.sequence == Sequence::MAX));

        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value.to_sat(), 10_000);
        assert_eq!(tx.output[0].script_pubkey, destination.script_pubkey());
        assert_eq!(tx.output[1].value.to_sat(), 3_000);
        assert_eq!(tx.output[1].script_pubkey, change_address.script_pubkey());

        // Conservation
        assert_eq!(
            unsigned.total_input(),
            unsigned.amount() + unsigned.fee() + unsigned.change()
        );
        assert_eq!(unsigned.tx_hash().len(), 64);
    }

    #[test]
    fn test_build_without_change() {
        let unsigned = UnsignedWithdrawalTx::build(
            unspents(&[11_000]),
            &p2pkh_address(),
            10_000,
            1_000,
            &p2sh_address(),
        )
        .unwrap();
        assert_eq!(unsigned.change(), 0);
        assert_eq!(unsigned.tx().output.len(), 1);
    }

    #[test]
    fn test_build_rejects_insufficient_inputs() {
        let result = UnsignedWithdrawalTx::build(
            unspents(&[5_000]),
            &p2pkh_address(),
            10_000,
            1_000,
            &p2sh_address(),
        );
        assert_eq!(
            result.unwrap_err(),
            TransactionError::InsufficientInputs {
                required: 11_000,
                available: 5_000
            }
        );

        let result =
            UnsignedWithdrawalTx::build(vec![], &p2pkh_address(), 1, 0, &p2sh_address());
        assert_eq!(result.unwrap_err(), TransactionError::NoInputs);
    }
}
