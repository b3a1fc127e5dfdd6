//! Notary wallet
//!
//! Holds the node's private keys, the addresses it watches and the
//! unspent outputs it has observed on those addresses.

use crate::core::{total_value, UnspentOutput};
use crate::crypto::KeyPair;
use bitcoin::{OutPoint, PubkeyHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// Read access to a wallet, as needed by withdrawal construction and signing
pub trait WalletView {
    /// Unspent outputs known to the wallet
    fn unspents(&self) -> Vec<UnspentOutput>;

    /// Check if the wallet watches the given address
    fn is_address_watched(&self, address: &str) -> bool;

    /// Find the private key whose public key hashes to `hash`
    fn find_key_from_pub_hash(&self, hash: &PubkeyHash) -> Option<KeyPair>;
}

/// Serializable wallet data for persistence
#[derive(Debug, Default, Serialize, Deserialize)]
struct WalletData {
    private_keys: Vec<String>,
    watched_addresses: Vec<String>,
    unspents: Vec<UnspentOutput>,
    label: Option<String>,
}

/// Keys, watched addresses and observed unspents of one notary
#[derive(Debug, Default, Clone)]
pub struct NotaryWallet {
    keys: Vec<KeyPair>,
    watched: BTreeSet<String>,
    unspents: Vec<UnspentOutput>,
    /// Optional label for the wallet
    pub label: Option<String>,
}

impl NotaryWallet {
    /// Create an empty wallet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::default()
        }
    }

    /// Generate a fresh key and add it to the wallet
    pub fn generate_key(&mut self) -> KeyPair {
        let key = KeyPair::generate();
        self.keys.push(key.clone());
        key
    }

    /// Import an existing key
    pub fn add_key(&mut self, key: KeyPair) {
        if !self
            .keys
            .iter()
            .any(|k| k.public_key == key.public_key)
        {
            self.keys.push(key);
        }
    }

    /// Import a key from its hex encoding
    pub fn import_private_key(&mut self, private_key_hex: &str) -> Result<KeyPair, WalletError> {
        let key = KeyPair::from_private_key_hex(private_key_hex)?;
        self.add_key(key.clone());
        Ok(key)
    }

    /// Keys held by the wallet
    pub fn keys(&self) -> &[KeyPair] {
        &self.keys
    }

    /// Start watching an address
    pub fn watch_address(&mut self, address: &str) -> bool {
        self.watched.insert(address.to_string())
    }

    /// Watched addresses in lexical order
    pub fn watched_addresses(&self) -> impl Iterator<Item = &String> {
        self.watched.iter()
    }

    /// Record an observed unspent output. Returns false if already known.
    pub fn add_unspent(&mut self, unspent: UnspentOutput) -> bool {
        if self.unspents.iter().any(|u| u.outpoint == unspent.outpoint) {
            return false;
        }
        self.unspents.push(unspent);
        true
    }

    /// Forget an output once it is seen spent on chain
    pub fn remove_unspent(&mut self, outpoint: &OutPoint) -> Option<UnspentOutput> {
        let idx = self.unspents.iter().position(|u| &u.outpoint == outpoint)?;
        Some(self.unspents.remove(idx))
    }

    /// Total value of known unspents
    pub fn balance(&self) -> u64 {
        total_value(&self.unspents)
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_keys: self.keys.iter().map(|k| k.private_key_hex()).collect(),
            watched_addresses: self.watched.iter().cloned().collect(),
            unspents: self.unspents.clone(),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let keys = data
            .private_keys
            .iter()
            .map(|hex_key| KeyPair::from_private_key_hex(hex_key))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keys,
            watched: data.watched_addresses.into_iter().collect(),
            unspents: data.unspents,
            label: data.label,
        })
    }

    /// Load the wallet at `path`, or start an empty one if the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, WalletError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

impl WalletView for NotaryWallet {
    fn unspents(&self) -> Vec<UnspentOutput> {
        self.unspents.clone()
    }

    fn is_address_watched(&self, address: &str) -> bool {
        self.watched.contains(address)
    }

    fn find_key_from_pub_hash(&self, hash: &PubkeyHash) -> Option<KeyPair> {
        self.keys.iter().find(|k| &k.pubkey_hash() == hash).cloned()
    }
}
