//! Registered multisig addresses
//!
//! Each federation address is defined by its public keys and signature
//! threshold. The address itself is always derived from those two values,
//! never stored on its own authority.

use crate::multisig::{create_ms_redeem_script, p2sh_address, MultisigError};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors related to the address registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Address already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Address not found: {0}")]
    AddressNotFound(String),
    #[error("Invalid multisig definition: {0}")]
    Multisig(#[from] MultisigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Default signature threshold for `n` notaries: more than two thirds
pub fn sign_threshold(n: usize) -> usize {
    n * 2 / 3 + 1
}

/// A multisig address and the keys that control it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredAddress {
    /// Base58 P2SH address
    pub address: String,
    /// Hex-encoded public keys, in registration order
    pub public_keys: Vec<String>,
    /// Signatures required to spend (M in M-of-N)
    pub threshold: usize,
    /// Client the address is assigned to, if any
    pub owner: Option<String>,
}

impl RegisteredAddress {
    /// Define a new multisig address
    ///
    /// # Errors
    /// Returns error if the threshold is out of range or any key is
    /// invalid or duplicated
    pub fn new(
        public_keys: Vec<String>,
        threshold: usize,
        owner: Option<String>,
        network: Network,
    ) -> Result<Self, RegistryError> {
        let redeem = create_ms_redeem_script(&public_keys, threshold)?;
        let address = p2sh_address(&redeem, network)?;

        Ok(Self {
            address: address.to_string(),
            public_keys,
            threshold,
            owner,
        })
    }

    /// Get the total signer count (N)
    pub fn signer_count(&self) -> usize {
        self.public_keys.len()
    }

    /// Check if the address is assigned to a client
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }
}

/// Read access to the federation's address registry
pub trait AddressRegistry: Send + Sync {
    /// All registered addresses
    fn registered_addresses(&self) -> Vec<RegisteredAddress>;

    /// Look up a single address
    fn find(&self, address: &str) -> Option<RegisteredAddress>;

    /// Addresses assigned to the given client
    fn client_addresses(&self, client: &str) -> Vec<RegisteredAddress> {
        self.registered_addresses()
            .into_iter()
            .filter(|r| r.owner.as_deref() == Some(client))
            .collect()
    }
}

/// Address registry kept in memory, optionally persisted as JSON
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryAddressRegistry {
    addresses: BTreeMap<String, RegisteredAddress>,
}

impl MemoryAddressRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address record
    pub fn register(&mut self, record: RegisteredAddress) -> Result<(), RegistryError> {
        if self.addresses.contains_key(&record.address) {
            return Err(RegistryError::AlreadyRegistered(record.address));
        }
        log::info!(
            "Registered {}-of-{} address {}",
            record.threshold,
            record.signer_count(),
            record.address
        );
        self.addresses.insert(record.address.clone(), record);
        Ok(())
    }

    /// Assign an address to a client
    pub fn assign(&mut self, address: &str, client: &str) -> Result<(), RegistryError> {
        let record = self
            .addresses
            .get_mut(address)
            .ok_or_else(|| RegistryError::AddressNotFound(address.to_string()))?;
        record.owner = Some(client.to_string());
        Ok(())
    }

    /// Number of registered addresses
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Save registry to file
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load registry from file
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load the registry at `path`, or start an empty one if the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self, RegistryError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

impl AddressRegistry for MemoryAddressRegistry {
    fn registered_addresses(&self) -> Vec<RegisteredAddress> {
        self.addresses.values().cloned().collect()
    }

    fn find(&self, address: &str) -> Option<RegisteredAddress> {
        self.addresses.get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use tempfile::tempdir;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|_| KeyPair::generate().public_key_hex()).collect()
    }

    #[test]
    fn test_sign_threshold() {
        assert_eq!(sign_threshold(1), 1);
        assert_eq!(sign_threshold(3), 3);
        assert_eq!(sign_threshold(4), 3);
        assert_eq!(sign_threshold(7), 5);
    }

    #[test]
    fn test_address_is_independent_of_key_order() {
        let pubkeys = keys(3);
        let mut reversed = pubkeys.clone();
        reversed.reverse();

        let a = RegisteredAddress::new(pubkeys, 2, None, Network::Regtest).unwrap();
        let b = RegisteredAddress::new(reversed, 2, None, Network::Regtest).unwrap();
        assert_eq!(a.address, b.address);
        assert!(a.address.starts_with('2'));
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(RegisteredAddress::new(keys(3), 0, None, Network::Regtest).is_err());
        assert!(RegisteredAddress::new(keys(3), 4, None, Network::Regtest).is_err());

        let mut duplicated = keys(2);
        duplicated.push(duplicated[0].clone());
        assert!(matches!(
            RegisteredAddress::new(duplicated, 2, None, Network::Regtest),
            Err(RegistryError::Multisig(MultisigError::DuplicateSigner))
        ));
    }

    #[test]
    fn test_registry_lookup_and_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = MemoryAddressRegistry::new();
        let owned =
            RegisteredAddress::new(keys(3), 2, Some("alice@notary".into()), Network::Regtest)
                .unwrap();
        let free = RegisteredAddress::new(keys(3), 2, None, Network::Regtest).unwrap();
        registry.register(owned.clone()).unwrap();
        registry.register(free.clone()).unwrap();
        assert!(matches!(
            registry.register(owned.clone()),
            Err(RegistryError::AlreadyRegistered(_))
        ));

        assert_eq!(registry.find(&owned.address), Some(owned.clone()));
        assert_eq!(registry.client_addresses("alice@notary"), vec![owned.clone()]);

        registry.assign(&free.address, "bob@notary").unwrap();
        assert!(registry.find(&free.address).unwrap().is_owned());

        registry.save(&path).unwrap();
        let loaded = MemoryAddressRegistry::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.find(&owned.address), Some(owned));
    }
}
