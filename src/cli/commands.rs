//! CLI commands for a notary node
//!
//! Implements all command handlers for the CLI interface.

use crate::config::NotaryConfig;
use crate::core::UnspentOutput;
use crate::ledger::DirLedger;
use crate::multisig::{Finalizer, SignCollector, TransactionSigner};
use crate::registry::{sign_threshold, MemoryAddressRegistry, RegisteredAddress};
use crate::wallet::NotaryWallet;
use crate::withdrawal::{
    parse_address, spawn_withdrawal_worker, TransactionCreator, UnsignedTransactions,
    WithdrawalDetails, WithdrawalWorker,
};
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{OutPoint, Txid};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub config: NotaryConfig,
    pub config_path: PathBuf,
    pub wallet: NotaryWallet,
    pub registry: MemoryAddressRegistry,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize application state
    pub fn new(data_dir: PathBuf, config_path: Option<PathBuf>) -> CliResult<Self> {
        fs::create_dir_all(&data_dir)?;
        let config_path = config_path.unwrap_or_else(|| data_dir.join("config.json"));
        let config = NotaryConfig::load(&config_path)?;

        let wallet_path = config.resolve(&data_dir, &config.wallet_path);
        let registry_path = config.resolve(&data_dir, &config.registry_path);
        let wallet = NotaryWallet::load_or_default(&wallet_path)?;
        let registry = MemoryAddressRegistry::load_or_default(&registry_path)?;

        Ok(Self {
            config,
            config_path,
            wallet,
            registry,
            data_dir,
        })
    }

    /// Resolve a configured path against the data directory
    pub fn path(&self, path: &Path) -> PathBuf {
        self.config.resolve(&self.data_dir, path)
    }

    /// Save wallet, registry and configuration
    pub fn save(&self) -> CliResult<()> {
        self.wallet.save(&self.path(&self.config.wallet_path))?;
        self.registry.save(&self.path(&self.config.registry_path))?;
        self.config.save(&self.config_path)?;
        Ok(())
    }

    fn collector(&self) -> SignCollector<DirLedger, MemoryAddressRegistry> {
        let registry = Arc::new(self.registry.clone());
        let ledger = Arc::new(DirLedger::new(self.path(&self.config.ledger_dir)));
        let signer = TransactionSigner::new(registry, self.config.network);
        SignCollector::new(ledger, signer, &self.config.notary_account_id)
    }
}

/// Add a fresh or imported key to the node wallet
pub fn cmd_keygen(state: &mut AppState, import: Option<&str>) -> CliResult<()> {
    let key = match import {
        Some(private_key_hex) => state.wallet.import_private_key(private_key_hex)?,
        None => state.wallet.generate_key(),
    };
    state.save()?;

    if import.is_some() {
        println!("🔐 Notary key imported!");
    } else {
        println!("🔐 New notary key created!");
    }
    println!("   🔑 Public Key: {}", key.public_key_hex());
    println!("   Share the public key with the federation to register addresses.");
    Ok(())
}

/// Register a multisig address and watch it
pub fn cmd_register(
    state: &mut AppState,
    keys: Vec<String>,
    threshold: Option<usize>,
    owner: Option<String>,
    change: bool,
) -> CliResult<()> {
    let threshold = threshold.unwrap_or_else(|| sign_threshold(keys.len()));
    let record = RegisteredAddress::new(keys, threshold, owner, state.config.network)?;
    let address = record.address.clone();

    state.registry.register(record.clone())?;
    state.wallet.watch_address(&address);
    if change {
        state.config.change_address = Some(address.clone());
    }
    state.save()?;

    println!("📍 Registered {}-of-{} address {}", threshold, record.signer_count(), address);
    if let Some(owner) = &record.owner {
        println!("   👤 Owner: {}", owner);
    }
    if change {
        println!("   🔁 Used as change address");
    }
    Ok(())
}

/// Record an observed unspent output
pub fn cmd_fund(
    state: &mut AppState,
    address: &str,
    txid: &str,
    vout: u32,
    value: u64,
    confirmations: u32,
) -> CliResult<()> {
    let address = parse_address(address, state.config.network)?;
    let outpoint = OutPoint::new(Txid::from_str(txid)?, vout);
    let unspent = UnspentOutput::new(outpoint, value, &address, confirmations);

    if state.wallet.add_unspent(unspent) {
        state.save()?;
        println!("💰 Recorded {} sat at {} ({})", value, address, outpoint);
    } else {
        println!("⚠️  Output {} is already known", outpoint);
    }
    println!("   Wallet balance: {} sat", state.wallet.balance());
    Ok(())
}

/// Build a withdrawal, sign it and publish the signatures
pub async fn cmd_withdraw(state: &AppState, to: &str, amount: u64, source: &str) -> CliResult<()> {
    let network = state.config.network;
    let change = parse_address(state.config.change_address()?, network)?;
    let unsigned_path = state.path(&state.config.unsigned_path);

    let registry = Arc::new(state.registry.clone());
    let pending = UnsignedTransactions::load(&unsigned_path)?;
    let mut creator = TransactionCreator::new(
        Arc::clone(&registry),
        state.config.fee.into_policy(),
        change,
        network,
    );
    // Outputs of withdrawals built by earlier runs stay reserved
    creator.restore_claims(pending.iter().map(|w| &w.tx));
    let unsigned = Arc::new(RwLock::new(pending));
    let worker = WithdrawalWorker::new(
        creator,
        state.collector(),
        Arc::new(RwLock::new(state.wallet.clone())),
        Arc::clone(&unsigned),
        state.config.confidence_level,
    );

    let (handle, join) = spawn_withdrawal_worker(worker, state.config.queue_capacity);
    let result = handle
        .submit(WithdrawalDetails::new(source, to, amount))
        .await;
    drop(handle);
    join.await?;
    let outcome = result?;

    unsigned.read().await.save(&unsigned_path)?;

    println!("✅ Withdrawal created!");
    println!("   📝 Tx: {}", outcome.tx_hash());
    println!("   📥 Inputs: {}", outcome.tx.inputs().len());
    println!("   💸 Amount: {} sat", outcome.tx.amount());
    println!("   ⛽ Fee: {} sat", outcome.tx.fee());
    println!("   🔁 Change: {} sat", outcome.tx.change());
    println!("   ✍️  Signed inputs: {}", outcome.signatures.len());
    println!("   Unsigned: {}", outcome.tx.raw_hex());
    Ok(())
}

/// Print all signatures published for a transaction
pub async fn cmd_signatures(state: &AppState, tx_hash: &str) -> CliResult<()> {
    let signatures = state.collector().get_signatures(tx_hash).await?;

    if signatures.is_empty() {
        println!("📭 No signatures published for {}", tx_hash);
        return Ok(());
    }

    println!("✍️  Signatures for {}:", tx_hash);
    for (index, sigs) in &signatures {
        println!("   Input {}: {} signature(s)", index, sigs.len());
        for sig in sigs {
            println!("      {}", sig);
        }
    }
    Ok(())
}

/// Assemble the signed transaction once enough signatures are published.
///
/// The spent outputs leave the wallet along with the pending entry.
pub async fn cmd_finalize(state: &mut AppState, tx_hash: &str) -> CliResult<()> {
    let unsigned_path = state.path(&state.config.unsigned_path);
    let mut unsigned = UnsignedTransactions::load(&unsigned_path)?;
    let withdrawal = unsigned
        .get(tx_hash)
        .cloned()
        .ok_or_else(|| format!("Unknown withdrawal {}", tx_hash))?;

    let finalizer = Finalizer::new(state.collector());
    match finalizer.try_finalize(&withdrawal.tx).await? {
        Some(tx) => {
            unsigned.remove(tx_hash);
            unsigned.save(&unsigned_path)?;
            for input in withdrawal.tx.inputs() {
                state.wallet.remove_unspent(&input.outpoint);
            }
            state.save()?;
            println!("✅ Withdrawal {} is fully signed", withdrawal.tx.tx_hash());
            println!("{}", serialize_hex(&tx));
        }
        None => {
            println!("⏳ Not enough signatures yet for {}", withdrawal.tx.tx_hash());
        }
    }
    Ok(())
}
