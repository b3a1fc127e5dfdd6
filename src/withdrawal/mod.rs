//! Withdrawal construction
//!
//! This module turns a withdrawal request into an unsigned transaction:
//! - UTXO selection with a content-derived, node-independent order
//! - transaction assembly and local double-spend protection
//! - tracking of withdrawals awaiting signatures
//! - the per-wallet worker that serializes requests

pub mod creator;
pub mod selector;
pub mod unsigned;
pub mod worker;

use crate::core::TransactionError;
use crate::multisig::MultisigError;
use thiserror::Error;

pub use creator::{available_addresses, parse_address, TransactionCreator};
pub use selector::{collect_unspents, ClaimedOutput, ClaimedOutputSet};
pub use unsigned::{UnsignedTransactions, UnsignedWithdrawal};
pub use worker::{
    spawn_withdrawal_worker, WithdrawalDetails, WithdrawalHandle, WithdrawalOutcome,
    WithdrawalRequest, WithdrawalWorker,
};

/// Withdrawal errors
#[derive(Error, Debug)]
pub enum WithdrawalError {
    #[error("Insufficient funds: required {required}, collected {collected}")]
    InsufficientFunds { required: u64, collected: u64 },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Amount {amount} is below the dust limit {dust_limit}")]
    DustAmount { amount: u64, dust_limit: u64 },
    #[error("Withdrawal worker stopped")]
    WorkerStopped,
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Signing error: {0}")]
    Multisig(#[from] MultisigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
