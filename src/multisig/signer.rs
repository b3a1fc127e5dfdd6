//! Local signer
//!
//! Signs every input of a withdrawal that this node holds a key for.

use super::redeem::{input_sighash, RedeemScriptResolver};
use super::signature::InputSignature;
use super::MultisigError;
use crate::core::UnsignedWithdrawalTx;
use crate::crypto::sign_digest_der;
use crate::registry::AddressRegistry;
use crate::wallet::WalletView;
use bitcoin::Network;
use std::sync::Arc;

/// Produces this node's signatures for withdrawal transactions
pub struct TransactionSigner<R> {
    resolver: RedeemScriptResolver<R>,
}

impl<R> Clone for TransactionSigner<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<R: AddressRegistry> TransactionSigner<R> {
    pub fn new(registry: Arc<R>, network: Network) -> Self {
        Self {
            resolver: RedeemScriptResolver::new(registry, network),
        }
    }

    pub fn resolver(&self) -> &RedeemScriptResolver<R> {
        &self.resolver
    }

    /// Sign each input the wallet holds a key for, in input order.
    ///
    /// # Errors
    /// `NoInputsSigned` if the wallet holds no key for any input, or any
    /// error resolving an input's redeem script.
    pub fn sign<W: WalletView + ?Sized>(
        &self,
        unsigned: &UnsignedWithdrawalTx,
        wallet: &W,
    ) -> Result<Vec<InputSignature>, MultisigError> {
        let tx = unsigned.tx();
        let tx_hash = unsigned.tx_hash();
        let mut signatures = Vec::new();

        for (index, spent) in unsigned.inputs().iter().enumerate() {
            let resolved = self.resolver.resolve_script_pubkey(&spent.script_pubkey)?;

            let key = resolved
                .public_keys
                .iter()
                .find_map(|pk| wallet.find_key_from_pub_hash(&pk.pubkey_hash()));
            let Some(key) = key else {
                log::warn!(
                    "Cannot sign input {} of {}: no key for {}",
                    index,
                    tx_hash,
                    resolved.record.address
                );
                continue;
            };

            let digest = input_sighash(tx, index, &resolved.redeem_script)?;
            let signature = sign_digest_der(&key.secret_key, digest);
            signatures.push(InputSignature::new(index as u32, &signature));

            log::info!(
                "Signed input {} of {} with key {}",
                index,
                tx_hash,
                key.public_key_hex()
            );
        }

        if signatures.is_empty() {
            return Err(MultisigError::NoInputsSigned { tx_hash });
        }
        Ok(signatures)
    }
}
