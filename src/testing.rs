//! Shared test fixtures

use crate::core::{FeePolicy, UnsignedWithdrawalTx, UnspentOutput, MIN_FEE};
use crate::crypto::KeyPair;
use crate::ledger::MemoryLedger;
use crate::multisig::{SignCollector, TransactionSigner};
use crate::registry::{MemoryAddressRegistry, RegisteredAddress};
use crate::wallet::NotaryWallet;
use crate::withdrawal::{parse_address, TransactionCreator};
use bitcoin::{Address, Network, OutPoint, ScriptBuf, Txid};
use std::str::FromStr;
use std::sync::Arc;

/// Outpoint with a synthetic transaction id derived from `n`
pub fn outpoint(n: u64, vout: u32) -> OutPoint {
    let txid = Txid::from_str(&format!("{:064x}", n)).unwrap();
    OutPoint::new(txid, vout)
}

/// A regtest P2PKH address outside any federation
pub fn p2pkh_address() -> Address {
    let key = KeyPair::from_private_key_hex(&"01".repeat(32)).unwrap();
    Address::p2pkh(key.pubkey_hash(), Network::Regtest)
}

/// A regtest P2SH address not backed by registered keys
pub fn p2sh_address() -> Address {
    Address::p2sh(&ScriptBuf::from_bytes(vec![0x51]), Network::Regtest).unwrap()
}

/// N notaries sharing one M-of-N address, each holding one key
pub struct Federation {
    pub network: Network,
    pub keys: Vec<KeyPair>,
    /// Wallet of each notary, watching the federation address
    pub wallets: Vec<NotaryWallet>,
    /// Address assigned to a client
    pub address: RegisteredAddress,
    /// Unassigned address receiving change
    pub change: RegisteredAddress,
    registry: Arc<MemoryAddressRegistry>,
    next_txid: u64,
}

impl Federation {
    pub fn new(n: usize, m: usize) -> Self {
        let network = Network::Regtest;
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        let public_keys: Vec<String> = keys.iter().map(|k| k.public_key_hex()).collect();

        let address = RegisteredAddress::new(
            public_keys.clone(),
            m,
            Some("client@notary".to_string()),
            network,
        )
        .unwrap();
        // Same keys with a lower threshold, so a distinct address
        let change = RegisteredAddress::new(public_keys, m.max(2) - 1, None, network).unwrap();

        let mut registry = MemoryAddressRegistry::new();
        registry.register(address.clone()).unwrap();
        registry.register(change.clone()).unwrap();

        let wallets = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let mut wallet = NotaryWallet::with_label(&format!("notary{}", i));
                wallet.add_key(key.clone());
                wallet.watch_address(&address.address);
                wallet
            })
            .collect();

        Self {
            network,
            keys,
            wallets,
            address,
            change,
            registry: Arc::new(registry),
            next_txid: 1,
        }
    }

    pub fn registry(&self) -> Arc<MemoryAddressRegistry> {
        Arc::clone(&self.registry)
    }

    fn multisig_address(&self) -> Address {
        parse_address(&self.address.address, self.network).unwrap()
    }

    fn fresh_unspents(
        &self,
        first_txid: u64,
        values: &[u64],
        confirmations: u32,
    ) -> Vec<UnspentOutput> {
        let address = self.multisig_address();
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let outpoint = outpoint(first_txid + i as u64, 0);
                UnspentOutput::new(outpoint, *value, &address, confirmations)
            })
            .collect()
    }

    /// Pay `values` to the federation address as seen by every notary
    pub fn fund(&mut self, values: &[u64], confirmations: u32) {
        let unspents = self.fresh_unspents(self.next_txid, values, confirmations);
        self.next_txid += values.len() as u64;
        for wallet in self.wallets.iter_mut() {
            for unspent in &unspents {
                wallet.add_unspent(unspent.clone());
            }
        }
    }

    /// Transaction creator paying change to the federation's change address
    pub fn creator(
        &self,
        fee_policy: Box<dyn FeePolicy>,
    ) -> TransactionCreator<MemoryAddressRegistry> {
        let change = parse_address(&self.change.address, self.network).unwrap();
        TransactionCreator::new(self.registry(), fee_policy, change, self.network)
    }

    /// One collector per notary, all writing to `ledger`
    pub fn collectors(
        &self,
        ledger: &Arc<MemoryLedger>,
    ) -> Vec<SignCollector<MemoryLedger, MemoryAddressRegistry>> {
        (0..self.keys.len())
            .map(|i| {
                let signer = TransactionSigner::new(self.registry(), self.network);
                SignCollector::new(Arc::clone(ledger), signer, &format!("notary{}@notary", i))
            })
            .collect()
    }

    /// Withdrawal of `amount` spending fresh federation outputs worth `values`
    pub fn unsigned_withdrawal(&self, values: &[u64], amount: u64) -> UnsignedWithdrawalTx {
        let inputs = self.fresh_unspents(1_000, values, 6);
        let change = parse_address(&self.change.address, self.network).unwrap();
        UnsignedWithdrawalTx::build(inputs, &p2pkh_address(), amount, MIN_FEE, &change).unwrap()
    }
}
