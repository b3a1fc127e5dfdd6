//! Finalizer
//!
//! Turns a withdrawal and the collected signature map into a fully signed
//! transaction. Every signature is checked against the reconstructed
//! redeem script before it is used; who published it does not matter.

use super::collector::{SignCollector, SignatureMap};
use super::redeem::{input_sighash, RedeemScriptResolver, ResolvedRedeem};
use super::MultisigError;
use crate::core::UnsignedWithdrawalTx;
use crate::crypto::verify_digest_der;
use crate::ledger::AccountDetailStore;
use crate::registry::AddressRegistry;
use bitcoin::opcodes::OP_0;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{ScriptBuf, Transaction};

/// Valid signatures of one input, one per key, in redeem script key order
fn valid_signatures(
    unsigned: &UnsignedWithdrawalTx,
    index: usize,
    resolved: &ResolvedRedeem,
    candidates: &[String],
) -> Result<Vec<Vec<u8>>, MultisigError> {
    let digest = input_sighash(unsigned.tx(), index, &resolved.redeem_script)?;
    let mut by_key: Vec<Option<Vec<u8>>> = vec![None; resolved.public_keys.len()];

    for candidate in candidates {
        let Ok(der) = hex::decode(candidate) else {
            log::warn!("Ignoring non-hex signature for input {}", index);
            continue;
        };
        let signer = resolved.public_keys.iter().position(|pk| {
            matches!(verify_digest_der(&pk.inner, digest, &der), Ok(true))
        });
        match signer {
            Some(position) if by_key[position].is_none() => by_key[position] = Some(der),
            Some(_) => log::debug!("Duplicate signature for input {}", index),
            None => log::warn!("Ignoring invalid signature for input {}", index),
        }
    }

    Ok(by_key.into_iter().flatten().collect())
}

/// Check if every input has enough valid signatures to be spent
pub fn is_enough_signatures_collected<R: AddressRegistry>(
    unsigned: &UnsignedWithdrawalTx,
    signatures: &SignatureMap,
    resolver: &RedeemScriptResolver<R>,
) -> Result<bool, MultisigError> {
    for (index, spent) in unsigned.inputs().iter().enumerate() {
        let resolved = resolver.resolve_script_pubkey(&spent.script_pubkey)?;
        let candidates = signatures
            .get(&(index as u32))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let valid = valid_signatures(unsigned, index, &resolved, candidates)?;
        if valid.len() < resolved.threshold() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Build the P2SH multisig script sig of every input.
///
/// # Errors
/// `NotEnoughSignatures` for the first input short of its threshold.
pub fn fill_tx_with_signatures<R: AddressRegistry>(
    unsigned: &UnsignedWithdrawalTx,
    signatures: &SignatureMap,
    resolver: &RedeemScriptResolver<R>,
) -> Result<Transaction, MultisigError> {
    let mut tx = unsigned.tx().clone();

    for (index, spent) in unsigned.inputs().iter().enumerate() {
        let resolved = resolver.resolve_script_pubkey(&spent.script_pubkey)?;
        let candidates = signatures
            .get(&(index as u32))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let valid = valid_signatures(unsigned, index, &resolved, candidates)?;
        if valid.len() < resolved.threshold() {
            return Err(MultisigError::NotEnoughSignatures {
                index,
                have: valid.len(),
                need: resolved.threshold(),
            });
        }

        tx.input[index].script_sig =
            multisig_script_sig(&valid[..resolved.threshold()], &resolved.redeem_script)?;
    }

    Ok(tx)
}

/// `OP_0 <sig||SIGHASH_ALL>... <redeem script>`
fn multisig_script_sig(
    signatures: &[Vec<u8>],
    redeem_script: &ScriptBuf,
) -> Result<ScriptBuf, MultisigError> {
    let mut builder = Builder::new().push_opcode(OP_0);
    for der in signatures {
        let mut sig = der.clone();
        sig.push(EcdsaSighashType::All.to_u32() as u8);
        let push = PushBytesBuf::try_from(sig)
            .map_err(|e| MultisigError::InvalidRedeemScript(e.to_string()))?;
        builder = builder.push_slice(push);
    }
    let redeem = PushBytesBuf::try_from(redeem_script.to_bytes())
        .map_err(|e| MultisigError::InvalidRedeemScript(e.to_string()))?;
    Ok(builder.push_slice(redeem).into_script())
}

/// Collect, check and fill in one step
pub struct Finalizer<L, R> {
    collector: SignCollector<L, R>,
}

impl<L: AccountDetailStore, R: AddressRegistry> Finalizer<L, R> {
    pub fn new(collector: SignCollector<L, R>) -> Self {
        Self { collector }
    }

    /// The signed transaction, or `None` while signatures are still missing
    pub async fn try_finalize(
        &self,
        unsigned: &UnsignedWithdrawalTx,
    ) -> Result<Option<Transaction>, MultisigError> {
        let tx_hash = unsigned.tx_hash();
        let signatures = self.collector.get_signatures(&tx_hash).await?;
        let resolver = self.collector.signer().resolver();

        if !is_enough_signatures_collected(unsigned, &signatures, resolver)? {
            log::info!("Not enough signatures collected for {} yet", tx_hash);
            return Ok(None);
        }

        let tx = fill_tx_with_signatures(unsigned, &signatures, resolver)?;
        log::info!("Withdrawal {} is fully signed", tx_hash);
        Ok(Some(tx))
    }
}
