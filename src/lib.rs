//! Notary withdrawal: federated Bitcoin withdrawals for a notary node
//!
//! Each notary of a federation runs the same pipeline for a withdrawal request:
//! - deterministic UTXO selection over the federation's multisig outputs
//! - assembly of an unsigned transaction, identical on every honest node
//! - local signing with the notary's key
//! - publication of signatures as details of a shared ledger account
//! - collection of all notaries' signatures and finalization once the
//!   multisig threshold is met
//!
//! # Example
//!
//! ```ignore
//! use notary_withdrawal::withdrawal::{spawn_withdrawal_worker, WithdrawalDetails};
//!
//! let (handle, _join) = spawn_withdrawal_worker(worker, 100);
//! let outcome = handle
//!     .submit(WithdrawalDetails::new("client@notary", &destination, 10_000))
//!     .await?;
//! println!("Published signatures for {}", outcome.tx_hash());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod multisig;
pub mod registry;
pub mod wallet;
pub mod withdrawal;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::NotaryConfig;
pub use core::{FeePolicy, FixedFee, SizeEstimateFee, UnsignedWithdrawalTx, UnspentOutput};
pub use crypto::KeyPair;
pub use ledger::{AccountDetailStore, DirLedger, MemoryLedger};
pub use multisig::{Finalizer, SignCollector, TransactionSigner};
pub use registry::{AddressRegistry, MemoryAddressRegistry, RegisteredAddress};
pub use wallet::{NotaryWallet, WalletView};
pub use withdrawal::{
    spawn_withdrawal_worker, ClaimedOutputSet, TransactionCreator, WithdrawalHandle,
    WithdrawalWorker,
};
