//! Multi-signature withdrawal signing
//!
//! Each notary holds one of the N keys of a federation address. Spending
//! from the address requires M signatures, gathered without any
//! coordination beyond the shared ledger:
//!
//! 1. every notary rebuilds the same redeem script from the registry
//! 2. signs the inputs it holds a key for
//! 3. publishes its signature list under a per-transaction account
//! 4. anyone can collect the merged map and finalize once M are present
//!
//! # Example
//!
//! ```ignore
//! use notary_withdrawal::multisig::{SignCollector, TransactionSigner};
//!
//! let signer = TransactionSigner::new(registry, Network::Regtest);
//! let collector = SignCollector::new(ledger, signer, "notary_a@notary");
//!
//! collector.add_signatures(&unsigned, &wallet).await?;
//! let signatures = collector.get_signatures(&unsigned.tx_hash()).await?;
//! ```

pub mod collector;
pub mod finalizer;
pub mod redeem;
pub mod signature;
pub mod signer;

use thiserror::Error;

pub use collector::{
    random_detail_key, short_tx_hash, sign_collect_account_id, SignCollector, SignatureMap,
    BTC_SIGN_COLLECT_DOMAIN, DETAIL_KEY_LEN, SHORT_TX_HASH_LEN,
};
pub use finalizer::{fill_tx_with_signatures, is_enough_signatures_collected, Finalizer};
pub use redeem::{
    create_ms_redeem_script, input_sighash, p2sh_address, sorted_public_keys,
    RedeemScriptResolver, ResolvedRedeem, MAX_MULTISIG_KEYS,
};
pub use signature::{
    decode_signatures, encode_signatures, InputSignature, PayloadError, SIGNATURE_PAYLOAD_VERSION,
};
pub use signer::TransactionSigner;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid signer count: need at least 1 signer")]
    InsufficientSigners,
    #[error("Too many signers: {0}, at most {} supported", MAX_MULTISIG_KEYS)]
    TooManySigners(usize),
    #[error("Duplicate signer public key")]
    DuplicateSigner,
    #[error("Invalid redeem script: {0}")]
    InvalidRedeemScript(String),
    #[error("Address not registered: {0}")]
    UnknownAddress(String),
    #[error("Sighash error: {0}")]
    Sighash(String),
    #[error("No inputs of {tx_hash} could be signed by this node")]
    NoInputsSigned { tx_hash: String },
    #[error("Insufficient signatures for input {index}: have {have}, need {need}")]
    NotEnoughSignatures {
        index: usize,
        have: usize,
        need: usize,
    },
    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}
