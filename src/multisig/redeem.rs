//! Multisig redeem scripts
//!
//! The redeem script of an address is rebuilt from its registered public
//! keys every time it is needed. Keys are put in lexicographic order of
//! their serialization (BIP-67), so every node derives a byte-identical
//! script from the same key set regardless of the order it was given in.

use super::MultisigError;
use crate::crypto::public_key_from_hex;
use crate::registry::{AddressRegistry, RegisteredAddress};
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::script::Builder;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Network, PublicKey, Script, ScriptBuf, Transaction};
use std::sync::Arc;

/// Largest N expressible with a small-integer opcode
pub const MAX_MULTISIG_KEYS: usize = 16;

/// Parse hex public keys and put them in canonical order
pub fn sorted_public_keys(public_keys: &[String]) -> Result<Vec<PublicKey>, MultisigError> {
    let mut keys = public_keys
        .iter()
        .map(|k| public_key_from_hex(k))
        .collect::<Result<Vec<_>, _>>()?;
    keys.sort_by_key(|k| k.to_bytes());

    if keys.windows(2).any(|w| w[0] == w[1]) {
        return Err(MultisigError::DuplicateSigner);
    }
    Ok(keys)
}

/// Build `OP_m <key_1> .. <key_n> OP_n OP_CHECKMULTISIG` over canonically ordered keys
pub fn create_ms_redeem_script(
    public_keys: &[String],
    threshold: usize,
) -> Result<ScriptBuf, MultisigError> {
    if public_keys.is_empty() {
        return Err(MultisigError::InsufficientSigners);
    }
    if public_keys.len() > MAX_MULTISIG_KEYS {
        return Err(MultisigError::TooManySigners(public_keys.len()));
    }
    if threshold == 0 {
        return Err(MultisigError::InvalidThreshold(
            "threshold must be at least 1".to_string(),
        ));
    }
    if threshold > public_keys.len() {
        return Err(MultisigError::InvalidThreshold(format!(
            "threshold {} exceeds signer count {}",
            threshold,
            public_keys.len()
        )));
    }

    let keys = sorted_public_keys(public_keys)?;
    Ok(redeem_script_from_keys(&keys, threshold))
}

fn redeem_script_from_keys(keys: &[PublicKey], threshold: usize) -> ScriptBuf {
    let mut builder = Builder::new().push_int(threshold as i64);
    for key in keys {
        builder = builder.push_key(key);
    }
    builder
        .push_int(keys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// P2SH address of a redeem script
pub fn p2sh_address(redeem_script: &Script, network: Network) -> Result<Address, MultisigError> {
    Address::p2sh(redeem_script, network)
        .map_err(|e| MultisigError::InvalidRedeemScript(e.to_string()))
}

/// Legacy `SIGHASH_ALL` digest of one input, committing to the redeem script
pub fn input_sighash(
    tx: &Transaction,
    input_index: usize,
    redeem_script: &Script,
) -> Result<[u8; 32], MultisigError> {
    let cache = SighashCache::new(tx);
    let sighash = cache
        .legacy_signature_hash(input_index, redeem_script, EcdsaSighashType::All.to_u32())
        .map_err(|e| MultisigError::Sighash(e.to_string()))?;
    Ok(sighash.to_byte_array())
}

/// A registered address together with its reconstructed redeem script
#[derive(Debug, Clone)]
pub struct ResolvedRedeem {
    pub record: RegisteredAddress,
    /// Keys in script order
    pub public_keys: Vec<PublicKey>,
    pub redeem_script: ScriptBuf,
}

impl ResolvedRedeem {
    pub fn threshold(&self) -> usize {
        self.record.threshold
    }

    /// Position of a key within the redeem script
    pub fn key_position(&self, key: &PublicKey) -> Option<usize> {
        self.public_keys.iter().position(|k| k == key)
    }
}

/// Resolves addresses and output scripts to redeem scripts through the registry
pub struct RedeemScriptResolver<R> {
    registry: Arc<R>,
    network: Network,
}

impl<R> Clone for RedeemScriptResolver<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            network: self.network,
        }
    }
}

impl<R: AddressRegistry> RedeemScriptResolver<R> {
    pub fn new(registry: Arc<R>, network: Network) -> Self {
        Self { registry, network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Resolve a base58 address
    pub fn resolve(&self, address: &str) -> Result<ResolvedRedeem, MultisigError> {
        let record = self
            .registry
            .find(address)
            .ok_or_else(|| MultisigError::UnknownAddress(address.to_string()))?;

        let public_keys = sorted_public_keys(&record.public_keys)?;
        let redeem_script = redeem_script_from_keys(&public_keys, record.threshold);

        // A record whose keys no longer hash to its address cannot be signed for
        let derived = p2sh_address(&redeem_script, self.network)?;
        if derived.to_string() != record.address {
            return Err(MultisigError::InvalidRedeemScript(format!(
                "keys of {} derive {}",
                record.address, derived
            )));
        }

        Ok(ResolvedRedeem {
            record,
            public_keys,
            redeem_script,
        })
    }

    /// Resolve the output script an input spends
    pub fn resolve_script_pubkey(
        &self,
        script_pubkey: &Script,
    ) -> Result<ResolvedRedeem, MultisigError> {
        let address = Address::from_script(script_pubkey, self.network)
            .map_err(|e| MultisigError::InvalidRedeemScript(e.to_string()))?;
        self.resolve(&address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::registry::MemoryAddressRegistry;
    use bitcoin::opcodes::all::{OP_PUSHNUM_2, OP_PUSHNUM_3};

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|_| KeyPair::generate().public_key_hex()).collect()
    }

    #[test]
    fn test_redeem_script_is_deterministic() {
        let pubkeys = keys(3);
        let first = create_ms_redeem_script(&pubkeys, 2).unwrap();
        let second = create_ms_redeem_script(&pubkeys, 2).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());

        let mut shuffled = pubkeys.clone();
        shuffled.rotate_left(1);
        let third = create_ms_redeem_script(&shuffled, 2).unwrap();
        assert_eq!(first.as_bytes(), third.as_bytes());
    }

    #[test]
    fn test_redeem_script_layout() {
        let pubkeys = keys(3);
        let script = create_ms_redeem_script(&pubkeys, 2).unwrap();
        let bytes = script.as_bytes();

        // OP_2, three 33-byte pushes, OP_3, OP_CHECKMULTISIG
        assert_eq!(bytes.len(), 1 + 3 * 34 + 2);
        assert_eq!(bytes[0], OP_PUSHNUM_2.to_u8());
        assert_eq!(bytes[bytes.len() - 2], OP_PUSHNUM_3.to_u8());
        assert_eq!(bytes[bytes.len() - 1], OP_CHECKMULTISIG.to_u8());

        let sorted = sorted_public_keys(&pubkeys).unwrap();
        assert!(sorted.windows(2).all(|w| w[0].to_bytes() < w[1].to_bytes()));
        assert_eq!(&bytes[2..35], sorted[0].to_bytes().as_slice());
    }

    #[test]
    fn test_redeem_script_validation() {
        assert!(matches!(
            create_ms_redeem_script(&[], 1),
            Err(MultisigError::InsufficientSigners)
        ));
        assert!(matches!(
            create_ms_redeem_script(&keys(2), 3),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            create_ms_redeem_script(&keys(17), 2),
            Err(MultisigError::TooManySigners(17))
        ));
        assert!(matches!(
            create_ms_redeem_script(&["nothex".to_string()], 1),
            Err(MultisigError::CryptoError(_))
        ));
    }

    #[test]
    fn test_resolver() {
        let pubkeys = keys(3);
        let record = RegisteredAddress::new(pubkeys.clone(), 2, None, Network::Regtest).unwrap();
        let mut registry = MemoryAddressRegistry::new();
        registry.register(record.clone()).unwrap();
        let resolver = RedeemScriptResolver::new(Arc::new(registry), Network::Regtest);

        let resolved = resolver.resolve(&record.address).unwrap();
        assert_eq!(resolved.threshold(), 2);
        assert_eq!(
            resolved.redeem_script,
            create_ms_redeem_script(&pubkeys, 2).unwrap()
        );

        let address = p2sh_address(&resolved.redeem_script, Network::Regtest).unwrap();
        let by_script = resolver
            .resolve_script_pubkey(&address.script_pubkey())
            .unwrap();
        assert_eq!(by_script.record, record);

        assert!(matches!(
            resolver.resolve("2NotRegistered"),
            Err(MultisigError::UnknownAddress(_))
        ));
    }
}
