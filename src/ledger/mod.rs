//! Shared ledger account-detail store
//!
//! The federation's shared ledger is used here purely as a key-value
//! broadcast medium: accounts are created on demand and every writer
//! appends details under keys of its choosing. Nothing is ever deleted.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::DirLedger;
pub use memory::MemoryLedger;

/// Maximum length of an account name
pub const MAX_ACCOUNT_NAME_LEN: usize = 32;

/// Maximum length of a detail key
pub const MAX_DETAIL_KEY_LEN: usize = 64;

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Invalid account name: {0}")]
    InvalidAccountName(String),
    #[error("Invalid detail key: {0}")]
    InvalidDetailKey(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One detail entry of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetail {
    /// Account that wrote the entry
    pub writer: String,
    pub key: String,
    pub value: String,
}

/// Account-detail store of the shared ledger
#[async_trait]
pub trait AccountDetailStore: Send + Sync {
    /// Create the account `name@domain`, returning its id
    async fn create_account(
        &self,
        name: &str,
        domain: &str,
        creator: &str,
    ) -> Result<String, LedgerError>;

    /// Set `key` to `value` on `account_id` as `writer`.
    ///
    /// A second write by the same writer under the same key replaces the
    /// earlier value.
    async fn set_account_detail(
        &self,
        account_id: &str,
        writer: &str,
        key: &str,
        value: &str,
    ) -> Result<(), LedgerError>;

    /// Every detail of an account, from all writers
    async fn get_account_details(&self, account_id: &str)
        -> Result<Vec<AccountDetail>, LedgerError>;
}

/// Full account id from name and domain
pub fn account_id(name: &str, domain: &str) -> String {
    format!("{}@{}", name, domain)
}

fn is_identifier(s: &str, max_len: usize) -> bool {
    !s.is_empty()
        && s.len() <= max_len
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check an account name or domain
pub(crate) fn validate_account_name(name: &str) -> Result<(), LedgerError> {
    if is_identifier(name, MAX_ACCOUNT_NAME_LEN) {
        Ok(())
    } else {
        Err(LedgerError::InvalidAccountName(name.to_string()))
    }
}

/// Check a full `name@domain` account id
pub(crate) fn validate_account_id(account_id: &str) -> Result<(), LedgerError> {
    let valid = match account_id.split_once('@') {
        Some((name, domain)) => {
            is_identifier(name, MAX_ACCOUNT_NAME_LEN) && is_identifier(domain, MAX_ACCOUNT_NAME_LEN)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidAccountName(account_id.to_string()))
    }
}

pub(crate) fn validate_detail_key(key: &str) -> Result<(), LedgerError> {
    if is_identifier(key, MAX_DETAIL_KEY_LEN) {
        Ok(())
    } else {
        Err(LedgerError::InvalidDetailKey(key.to_string()))
    }
}
