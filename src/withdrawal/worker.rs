//! Per-wallet withdrawal worker
//!
//! Withdrawal requests (typically transfers observed on the ledger) are
//! queued to one worker task per wallet and handled strictly one at a
//! time. The worker owns the wallet's [`TransactionCreator`], so no two
//! requests can claim the same outpoint. Only publishing signatures waits
//! on the ledger, and workers of different wallets never wait on each other.

use super::creator::TransactionCreator;
use super::unsigned::UnsignedTransactions;
use super::WithdrawalError;
use crate::core::UnsignedWithdrawalTx;
use crate::ledger::AccountDetailStore;
use crate::multisig::{InputSignature, SignCollector};
use crate::registry::AddressRegistry;
use crate::wallet::WalletView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// A requested withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalDetails {
    /// Ledger account the funds come from
    pub source_account_id: String,
    /// Bitcoin destination address
    pub destination: String,
    pub amount_sat: u64,
    pub withdrawal_time: DateTime<Utc>,
}

impl WithdrawalDetails {
    pub fn new(source_account_id: &str, destination: &str, amount_sat: u64) -> Self {
        Self {
            source_account_id: source_account_id.to_string(),
            destination: destination.to_string(),
            amount_sat,
            withdrawal_time: Utc::now(),
        }
    }
}

/// Result of a processed withdrawal
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub tx: UnsignedWithdrawalTx,
    /// Signatures this node published
    pub signatures: Vec<InputSignature>,
}

impl WithdrawalOutcome {
    pub fn tx_hash(&self) -> String {
        self.tx.tx_hash()
    }
}

/// Request sent from [`WithdrawalHandle`] to the worker task
#[derive(Debug)]
pub struct WithdrawalRequest {
    pub details: WithdrawalDetails,
    pub reply: oneshot::Sender<Result<WithdrawalOutcome, WithdrawalError>>,
}

/// Handle for submitting withdrawals to a worker
#[derive(Debug, Clone)]
pub struct WithdrawalHandle {
    tx: mpsc::Sender<WithdrawalRequest>,
}

impl WithdrawalHandle {
    /// Queue a withdrawal and wait for it to be processed
    pub async fn submit(
        &self,
        details: WithdrawalDetails,
    ) -> Result<WithdrawalOutcome, WithdrawalError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WithdrawalRequest { details, reply })
            .await
            .map_err(|_| WithdrawalError::WorkerStopped)?;

        match rx.await {
            Ok(res) => res,
            // worker dropped the request
            Err(_) => Err(WithdrawalError::WorkerStopped),
        }
    }
}

/// State owned by one wallet's worker task
pub struct WithdrawalWorker<L, R, W> {
    creator: TransactionCreator<R>,
    collector: SignCollector<L, R>,
    wallet: Arc<RwLock<W>>,
    unsigned: Arc<RwLock<UnsignedTransactions>>,
    confidence_level: u32,
}

impl<L, R, W> WithdrawalWorker<L, R, W>
where
    L: AccountDetailStore + 'static,
    R: AddressRegistry + 'static,
    W: WalletView + Send + Sync + 'static,
{
    pub fn new(
        creator: TransactionCreator<R>,
        collector: SignCollector<L, R>,
        wallet: Arc<RwLock<W>>,
        unsigned: Arc<RwLock<UnsignedTransactions>>,
        confidence_level: u32,
    ) -> Self {
        Self {
            creator,
            collector,
            wallet,
            unsigned,
            confidence_level,
        }
    }

    /// Build, sign, publish and record one withdrawal
    pub async fn process(
        &mut self,
        details: &WithdrawalDetails,
    ) -> Result<WithdrawalOutcome, WithdrawalError> {
        let dust_limit = self.creator.fee_policy().dust_limit();
        if details.amount_sat == 0 || details.amount_sat < dust_limit {
            return Err(WithdrawalError::DustAmount {
                amount: details.amount_sat,
                dust_limit,
            });
        }

        let (tx, signatures) = {
            let wallet = self.wallet.read().await;
            let tx = self.creator.create_transaction(
                &*wallet,
                details.amount_sat,
                &details.destination,
                self.confidence_level,
            )?;
            let signatures = self.collector.signer().sign(&tx, &*wallet)?;
            (tx, signatures)
        };

        self.collector
            .publish_signatures(&tx.tx_hash(), &signatures)
            .await?;
        self.unsigned
            .write()
            .await
            .mark_as_unsigned(details.clone(), tx.clone());

        Ok(WithdrawalOutcome { tx, signatures })
    }
}

/// Start a worker task. It runs until every handle is dropped.
pub fn spawn_withdrawal_worker<L, R, W>(
    mut worker: WithdrawalWorker<L, R, W>,
    queue_capacity: usize,
) -> (WithdrawalHandle, JoinHandle<()>)
where
    L: AccountDetailStore + 'static,
    R: AddressRegistry + 'static,
    W: WalletView + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WithdrawalRequest>(queue_capacity.max(1));

    let join = tokio::spawn(async move {
        log::info!("Withdrawal worker started");
        while let Some(request) = rx.recv().await {
            let details = &request.details;
            log::info!(
                "Processing withdrawal of {} sat from {} to {}",
                details.amount_sat,
                details.source_account_id,
                details.destination
            );

            let result = worker.process(details).await;
            match &result {
                Ok(outcome) => log::info!(
                    "Withdrawal {} created with {} local signature(s)",
                    outcome.tx_hash(),
                    outcome.signatures.len()
                ),
                Err(e) => log::error!(
                    "Withdrawal from {} failed: {}",
                    details.source_account_id,
                    e
                ),
            }

            if request.reply.send(result).is_err() {
                log::debug!("Withdrawal requester went away");
            }
        }
        log::info!("Withdrawal worker stopped");
    });

    (WithdrawalHandle { tx }, join)
}
