//! Withdrawal transaction assembly

use super::selector::{collect_unspents, ClaimedOutputSet};
use super::WithdrawalError;
use crate::core::{FeePolicy, UnsignedWithdrawalTx, WITHDRAWAL_OUTPUTS};
use crate::registry::AddressRegistry;
use crate::wallet::WalletView;
use bitcoin::{Address, Network};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Parse a base58 address and check it belongs to `network`
pub fn parse_address(address: &str, network: Network) -> Result<Address, WithdrawalError> {
    Address::from_str(address)
        .map_err(|e| WithdrawalError::InvalidAddress(format!("{}: {}", address, e)))?
        .require_network(network)
        .map_err(|e| WithdrawalError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Addresses whose unspents may fund a withdrawal: registered addresses
/// assigned to a client that the wallet watches, plus the change address
/// when watched.
pub fn available_addresses<R, W>(
    registry: &R,
    wallet: &W,
    change_address: &str,
) -> HashSet<String>
where
    R: AddressRegistry + ?Sized,
    W: WalletView + ?Sized,
{
    let mut available: HashSet<String> = registry
        .registered_addresses()
        .into_iter()
        .filter(|r| r.is_owned() && wallet.is_address_watched(&r.address))
        .map(|r| r.address)
        .collect();

    if wallet.is_address_watched(change_address) {
        available.insert(change_address.to_string());
    }
    available
}

/// Builds withdrawal transactions for one wallet.
///
/// Owns the node's claimed output set. Every mutation goes through
/// `&mut self`, so whoever owns the creator is the single writer.
pub struct TransactionCreator<R> {
    registry: Arc<R>,
    claimed: ClaimedOutputSet,
    fee_policy: Box<dyn FeePolicy>,
    change_address: Address,
    network: Network,
}

impl<R: AddressRegistry> TransactionCreator<R> {
    pub fn new(
        registry: Arc<R>,
        fee_policy: Box<dyn FeePolicy>,
        change_address: Address,
        network: Network,
    ) -> Self {
        Self {
            registry,
            claimed: ClaimedOutputSet::new(),
            fee_policy,
            change_address,
            network,
        }
    }

    pub fn claimed(&self) -> &ClaimedOutputSet {
        &self.claimed
    }

    pub fn fee_policy(&self) -> &dyn FeePolicy {
        self.fee_policy.as_ref()
    }

    pub fn change_address(&self) -> &Address {
        &self.change_address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Claim the inputs of withdrawals this node built earlier and that are
    /// still pending, so a restarted node does not spend them again.
    ///
    /// Returns the number of newly claimed outpoints.
    pub fn restore_claims<'a, I>(&mut self, pending: I) -> usize
    where
        I: IntoIterator<Item = &'a UnsignedWithdrawalTx>,
    {
        let mut restored = 0;
        for unsigned in pending {
            let tx_hash = unsigned.tx_hash();
            for input in unsigned.inputs() {
                let claimant = self.claimed.claimant(&input.outpoint);
                if let Some(other) = claimant.filter(|other| *other != tx_hash) {
                    log::warn!(
                        "{} is spent by pending withdrawals {} and {}",
                        input.outpoint,
                        other,
                        tx_hash
                    );
                }
            }
            restored += self.claimed.claim(&tx_hash, unsigned.inputs());
        }
        if restored > 0 {
            log::info!("Restored {} claimed output(s) from pending withdrawals", restored);
        }
        restored
    }

    /// Build an unsigned withdrawal of `amount` to `destination` and claim its inputs.
    ///
    /// Nothing is claimed unless a transaction is returned.
    pub fn create_transaction<W: WalletView + ?Sized>(
        &mut self,
        wallet: &W,
        amount: u64,
        destination: &str,
        confidence_level: u32,
    ) -> Result<UnsignedWithdrawalTx, WithdrawalError> {
        let destination = parse_address(destination, self.network)?;

        let change_address = self.change_address.to_string();
        let available = available_addresses(self.registry.as_ref(), wallet, &change_address);
        log::info!("Available addresses for withdrawal: {:?}", available);

        let inputs = collect_unspents(
            &available,
            wallet,
            amount,
            confidence_level,
            self.fee_policy.as_ref(),
            &self.claimed,
        )?;
        let fee = self.fee_policy.fee(inputs.len(), WITHDRAWAL_OUTPUTS);

        let unsigned =
            UnsignedWithdrawalTx::build(inputs, &destination, amount, fee, &self.change_address)?;
        let tx_hash = unsigned.tx_hash();
        self.claimed.claim(&tx_hash, unsigned.inputs());

        log::info!(
            "Created withdrawal {}: {} input(s), amount {}, fee {}, change {}",
            tx_hash,
            unsigned.inputs().len(),
            amount,
            fee,
            unsigned.change()
        );
        for input in unsigned.inputs() {
            log::info!("  spending {} ({} sat)", input.outpoint, input.value);
        }

        Ok(unsigned)
    }
}
