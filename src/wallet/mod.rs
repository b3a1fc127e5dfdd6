//! Wallet module for notary keys and observed unspents

pub mod wallet;

pub use wallet::{NotaryWallet, WalletError, WalletView};
