//! Core withdrawal primitives
//!
//! This module contains the building blocks shared by every notary:
//! - Unspent outputs and their content-derived ordering key
//! - Unsigned withdrawal transactions
//! - Fee policies

pub mod fee;
pub mod transaction;
pub mod unspent;

pub use fee::{
    FeePolicy, FeeRate, FixedFee, SizeEstimateFee, BYTES_PER_INPUT, BYTES_PER_OUTPUT, MIN_FEE,
    TX_OVERHEAD_BYTES, WITHDRAWAL_OUTPUTS,
};
pub use transaction::{TransactionError, UnsignedWithdrawalTx, SEQUENCE_FINAL, TX_VERSION};
pub use unspent::{total_value, UnspentOutput};
