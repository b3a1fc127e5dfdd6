//! Signature publisher and collector
//!
//! Notaries exchange signatures through a per-transaction account on the
//! shared ledger. Each notary writes its own signature list as one detail
//! under a random key; readers merge every detail they can see.

use super::signature::{decode_signatures, encode_signatures, InputSignature};
use super::signer::TransactionSigner;
use super::MultisigError;
use crate::core::UnsignedWithdrawalTx;
use crate::crypto::truncate_hash;
use crate::ledger::{account_id, AccountDetailStore, LedgerError};
use crate::registry::AddressRegistry;
use crate::wallet::WalletView;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Domain of signature collection accounts
pub const BTC_SIGN_COLLECT_DOMAIN: &str = "btcSignCollect";

/// Characters of the transaction hash used as account name
pub const SHORT_TX_HASH_LEN: usize = 32;

/// Length of the random detail key each publication is stored under
pub const DETAIL_KEY_LEN: usize = 32;

/// Signatures per input index, from all notaries
pub type SignatureMap = BTreeMap<u32, Vec<String>>;

/// Account name derived from a transaction hash
pub fn short_tx_hash(tx_hash: &str) -> &str {
    truncate_hash(tx_hash, SHORT_TX_HASH_LEN)
}

/// Id of the account collecting signatures for a transaction
pub fn sign_collect_account_id(tx_hash: &str) -> String {
    account_id(short_tx_hash(tx_hash), BTC_SIGN_COLLECT_DOMAIN)
}

/// Fresh random detail key
pub fn random_detail_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DETAIL_KEY_LEN)
        .map(char::from)
        .collect()
}

/// Publishes this node's signatures and collects everyone's
pub struct SignCollector<L, R> {
    ledger: Arc<L>,
    signer: TransactionSigner<R>,
    notary_account_id: String,
}

impl<L, R> Clone for SignCollector<L, R> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            signer: self.signer.clone(),
            notary_account_id: self.notary_account_id.clone(),
        }
    }
}

impl<L: AccountDetailStore, R: AddressRegistry> SignCollector<L, R> {
    /// Create a collector writing to `ledger` as `notary_account_id`
    pub fn new(ledger: Arc<L>, signer: TransactionSigner<R>, notary_account_id: &str) -> Self {
        Self {
            ledger,
            signer,
            notary_account_id: notary_account_id.to_string(),
        }
    }

    pub fn signer(&self) -> &TransactionSigner<R> {
        &self.signer
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn notary_account_id(&self) -> &str {
        &self.notary_account_id
    }

    /// Sign a withdrawal locally and publish the signatures
    pub async fn add_signatures<W: WalletView + Sync + ?Sized>(
        &self,
        unsigned: &UnsignedWithdrawalTx,
        wallet: &W,
    ) -> Result<Vec<InputSignature>, MultisigError> {
        let signatures = self.signer.sign(unsigned, wallet)?;
        self.publish_signatures(&unsigned.tx_hash(), &signatures)
            .await?;
        Ok(signatures)
    }

    /// Publish already produced signatures for `tx_hash`
    pub async fn publish_signatures(
        &self,
        tx_hash: &str,
        signatures: &[InputSignature],
    ) -> Result<(), MultisigError> {
        let short_hash = short_tx_hash(tx_hash);
        let account = match self
            .ledger
            .create_account(short_hash, BTC_SIGN_COLLECT_DOMAIN, &self.notary_account_id)
            .await
        {
            Ok(account) => account,
            Err(LedgerError::AccountAlreadyExists(account)) => {
                log::warn!("Signature collection account {} already exists", account);
                account
            }
            Err(e) => return Err(e.into()),
        };

        let payload = encode_signatures(signatures)?;
        let key = random_detail_key();
        self.ledger
            .set_account_detail(&account, &self.notary_account_id, &key, &payload)
            .await?;

        log::info!(
            "Published {} signature(s) for {} to {}",
            signatures.len(),
            tx_hash,
            account
        );
        Ok(())
    }

    /// Every signature published for `tx_hash`, grouped by input index.
    ///
    /// Entries that fail to decode are skipped. The result may be partial
    /// while other notaries have yet to publish.
    pub async fn get_signatures(&self, tx_hash: &str) -> Result<SignatureMap, MultisigError> {
        let account = sign_collect_account_id(tx_hash);
        let details = self.ledger.get_account_details(&account).await?;

        let mut merged = SignatureMap::new();
        for detail in details {
            let signatures = match decode_signatures(&detail.value) {
                Ok(signatures) => signatures,
                Err(e) => {
                    log::warn!(
                        "Skipping signature entry {} from {} in {}: {}",
                        detail.key,
                        detail.writer,
                        account,
                        e
                    );
                    continue;
                }
            };
            for signature in signatures {
                merged
                    .entry(signature.index)
                    .or_default()
                    .push(signature.signature_hex);
            }
        }

        log::debug!(
            "Collected signatures for {} input(s) of {}",
            merged.len(),
            tx_hash
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::testing::Federation;

    #[test]
    fn test_account_naming() {
        let tx_hash = "ab".repeat(32);
        assert_eq!(short_tx_hash(&tx_hash).len(), SHORT_TX_HASH_LEN);
        assert_eq!(
            sign_collect_account_id(&tx_hash),
            format!("{}@btcSignCollect", &tx_hash[..32])
        );

        let key = random_detail_key();
        assert_eq!(key.len(), DETAIL_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, random_detail_key());
    }

    #[tokio::test]
    async fn test_two_of_three_collection() {
        let federation = Federation::new(3, 2);
        let ledger = Arc::new(MemoryLedger::new());
        let collectors = federation.collectors(&ledger);
        let unsigned = federation.unsigned_withdrawal(&[20_000], 10_000);
        let tx_hash = unsigned.tx_hash();

        // Node C holds no key for the address
        let outsider = crate::wallet::NotaryWallet::new();
        assert!(collectors[2]
            .add_signatures(&unsigned, &outsider)
            .await
            .is_err());

        let sig_a = collectors[0]
            .add_signatures(&unsigned, &federation.wallets[0])
            .await
            .unwrap();
        let sig_b = collectors[1]
            .add_signatures(&unsigned, &federation.wallets[1])
            .await
            .unwrap();

        let collected = collectors[2].get_signatures(&tx_hash).await.unwrap();
        assert_eq!(collected.len(), 1);
        let mut at_zero = collected[&0].clone();
        at_zero.sort();
        let mut expected = vec![
            sig_a[0].signature_hex.clone(),
            sig_b[0].signature_hex.clone(),
        ];
        expected.sort();
        assert_eq!(at_zero, expected);
    }

    #[tokio::test]
    async fn test_aggregates_every_publication() {
        let federation = Federation::new(3, 2);
        let ledger = Arc::new(MemoryLedger::new());
        let collectors = federation.collectors(&ledger);
        let unsigned = federation.unsigned_withdrawal(&[20_000], 10_000);
        let tx_hash = unsigned.tx_hash();

        // Duplicate publications are kept; deduplication is the finalizer's job
        for (collector, wallet) in collectors.iter().zip(&federation.wallets) {
            collector.add_signatures(&unsigned, wallet).await.unwrap();
        }
        collectors[0]
            .add_signatures(&unsigned, &federation.wallets[0])
            .await
            .unwrap();

        let collected = collectors[1].get_signatures(&tx_hash).await.unwrap();
        assert_eq!(collected[&0].len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_skipped() {
        let federation = Federation::new(3, 2);
        let ledger = Arc::new(MemoryLedger::new());
        let collectors = federation.collectors(&ledger);
        let unsigned = federation.unsigned_withdrawal(&[20_000], 10_000);
        let tx_hash = unsigned.tx_hash();

        collectors[0]
            .add_signatures(&unsigned, &federation.wallets[0])
            .await
            .unwrap();
        let account = sign_collect_account_id(&tx_hash);
        ledger
            .set_account_detail(&account, "mallory@notary", "garbage", "{not a list")
            .await
            .unwrap();

        let collected = collectors[1].get_signatures(&tx_hash).await.unwrap();
        assert_eq!(collected[&0].len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_transaction_propagates() {
        let federation = Federation::new(3, 2);
        let ledger = Arc::new(MemoryLedger::new());
        let collectors = federation.collectors(&ledger);

        let result = collectors[0].get_signatures(&"00".repeat(32)).await;
        assert!(matches!(
            result,
            Err(MultisigError::Ledger(LedgerError::AccountNotFound(_)))
        ));
    }
}
