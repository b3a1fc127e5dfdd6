//! UTXO selection
//!
//! Notaries never agree on inputs by talking to each other. Each one orders
//! its candidates by a content hash and takes them first-fit, so nodes that
//! observe the same chain pick the same inputs on their own.

use super::WithdrawalError;
use crate::core::{FeePolicy, UnspentOutput, WITHDRAWAL_OUTPUTS};
use crate::wallet::WalletView;
use bitcoin::OutPoint;
use std::collections::{HashMap, HashSet};

/// An outpoint this node has committed to a withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedOutput {
    pub outpoint: OutPoint,
    /// Withdrawal that spends it
    pub tx_hash: String,
}

/// Outpoints already selected by this node.
///
/// Lives for the lifetime of the process and is never shared. Claims are
/// never released: a retried withdrawal does not reuse earlier inputs.
#[derive(Debug, Default)]
pub struct ClaimedOutputSet {
    arena: Vec<ClaimedOutput>,
    index: HashMap<OutPoint, usize>,
}

impl ClaimedOutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an outpoint has been claimed
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.index.contains_key(outpoint)
    }

    /// Claim outputs for a withdrawal. Returns the number of new claims.
    pub fn claim(&mut self, tx_hash: &str, outputs: &[UnspentOutput]) -> usize {
        let mut added = 0;
        for output in outputs {
            if self.index.contains_key(&output.outpoint) {
                continue;
            }
            self.index.insert(output.outpoint, self.arena.len());
            self.arena.push(ClaimedOutput {
                outpoint: output.outpoint,
                tx_hash: tx_hash.to_string(),
            });
            added += 1;
        }
        added
    }

    /// Withdrawal an outpoint was claimed by
    pub fn claimant(&self, outpoint: &OutPoint) -> Option<&str> {
        self.index
            .get(outpoint)
            .map(|&i| self.arena[i].tx_hash.as_str())
    }

    /// Outpoints claimed by one withdrawal, in claim order
    pub fn claimed_by(&self, tx_hash: &str) -> Vec<OutPoint> {
        self.arena
            .iter()
            .filter(|c| c.tx_hash == tx_hash)
            .map(|c| c.outpoint)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

/// Select inputs covering `amount` plus fee.
///
/// Candidates are the wallet's unspents that are paid to one of
/// `available_addresses`, have at least `confidence_level` confirmations,
/// are not claimed and are not dust. They are taken in sort key order until
/// the collected value reaches `amount + fee(k, 2)` for `k` picked inputs.
///
/// Reads `claimed` only; claiming is left to the caller.
pub fn collect_unspents<W: WalletView + ?Sized>(
    available_addresses: &HashSet<String>,
    wallet: &W,
    amount: u64,
    confidence_level: u32,
    fee_policy: &dyn FeePolicy,
    claimed: &ClaimedOutputSet,
) -> Result<Vec<UnspentOutput>, WithdrawalError> {
    let dust_limit = fee_policy.dust_limit();

    let mut candidates: Vec<UnspentOutput> = wallet
        .unspents()
        .into_iter()
        .filter(|u| u.confirmations >= confidence_level)
        .filter(|u| !claimed.contains(&u.outpoint))
        .filter(|u| u.is_paid_to_any(available_addresses))
        .filter(|u| u.value >= dust_limit)
        .collect();
    candidates.sort_by_cached_key(|u| (u.sort_key(), u.outpoint));

    let mut selected = Vec::new();
    let mut collected = 0u64;
    for candidate in candidates {
        collected = collected.saturating_add(candidate.value);
        selected.push(candidate);

        let required = amount.saturating_add(fee_policy.fee(selected.len(), WITHDRAWAL_OUTPUTS));
        if collected >= required {
            log::debug!(
                "Selected {} unspent(s) worth {} for {}",
                selected.len(),
                collected,
                required
            );
            return Ok(selected);
        }
    }

    let required =
        amount.saturating_add(fee_policy.fee(selected.len().max(1), WITHDRAWAL_OUTPUTS));
    Err(WithdrawalError::InsufficientFunds {
        required,
        collected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeeRate, FixedFee, SizeEstimateFee};
    use crate::testing::{outpoint, p2pkh_address, p2sh_address};
    use crate::wallet::NotaryWallet;

    fn funded_wallet(values: &[(u64, u32)]) -> (NotaryWallet, HashSet<String>) {
        let address = p2sh_address();
        let mut wallet = NotaryWallet::new();
        wallet.watch_address(&address.to_string());
        for (i, (value, confirmations)) in values.iter().enumerate() {
            wallet.add_unspent(UnspentOutput::new(
                outpoint(i as u64 + 1, 0),
                *value,
                &address,
                *confirmations,
            ));
        }
        let available = HashSet::from([address.to_string()]);
        (wallet, available)
    }

    #[test]
    fn test_selection_is_deterministic() {
        let values: Vec<(u64, u32)> = (1..=20).map(|i| (i * 1_000, 6)).collect();
        let (wallet_a, available) = funded_wallet(&values);

        // Same outputs observed in a different order
        let address = p2sh_address();
        let mut wallet_b = NotaryWallet::new();
        for (i, (value, confirmations)) in values.iter().enumerate().rev() {
            wallet_b.add_unspent(UnspentOutput::new(
                outpoint(i as u64 + 1, 0),
                *value,
                &address,
                *confirmations,
            ));
        }

        let claimed = ClaimedOutputSet::new();
        let fee = FixedFee::default();
        let a = collect_unspents(&available, &wallet_a, 25_000, 6, &fee, &claimed).unwrap();
        let b = collect_unspents(&available, &wallet_b, 25_000, 6, &fee, &claimed).unwrap();
        assert_eq!(a, b);

        let keys: Vec<_> = a.iter().map(|u| u.sort_key()).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_example_both_outputs_selected() {
        let (wallet, available) = funded_wallet(&[(5_000, 6), (9_000, 6)]);
        let selected = collect_unspents(
            &available,
            &wallet,
            10_000,
            6,
            &FixedFee::default(),
            &ClaimedOutputSet::new(),
        )
        .unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(crate::core::total_value(&selected), 14_000);
    }

    #[test]
    fn test_insufficient_funds() {
        let (wallet, available) = funded_wallet(&[(4_000, 6), (5_000, 6), (50_000, 2)]);
        let result = collect_unspents(
            &available,
            &wallet,
            10_000,
            6,
            &FixedFee::default(),
            &ClaimedOutputSet::new(),
        );
        assert!(matches!(
            result,
            Err(WithdrawalError::InsufficientFunds {
                required: 11_000,
                collected: 9_000
            })
        ));
    }

    #[test]
    fn test_filters() {
        let (mut wallet, available) = funded_wallet(&[(5_000, 6), (9_000, 6)]);
        // Unrelated address
        wallet.add_unspent(UnspentOutput::new(outpoint(50, 0), 100_000, &p2pkh_address(), 6));

        let mut claimed = ClaimedOutputSet::new();
        let first = wallet.unspents()[0].clone();
        claimed.claim("withdrawal", &[first.clone()]);

        let selected = collect_unspents(
            &available,
            &wallet,
            1_000,
            6,
            &FixedFee::default(),
            &claimed,
        )
        .unwrap();
        assert_eq!(selected.len(), 1);
        assert_ne!(selected[0].outpoint, first.outpoint);
        assert_eq!(selected[0].address, p2sh_address().to_string());
    }

    #[test]
    fn test_dust_outputs_are_skipped() {
        let (wallet, available) = funded_wallet(&[(100, 6), (200, 6), (5_000, 6)]);
        let policy = SizeEstimateFee::new(FeeRate::from_sat_per_byte(1));

        let selected = collect_unspents(
            &available,
            &wallet,
            1_000,
            6,
            &policy,
            &ClaimedOutputSet::new(),
        )
        .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, 5_000);
    }

    #[test]
    fn test_claimed_output_set() {
        let address = p2sh_address();
        let outputs = vec![
            UnspentOutput::new(outpoint(1, 0), 1, &address, 6),
            UnspentOutput::new(outpoint(2, 0), 1, &address, 6),
        ];

        let mut claimed = ClaimedOutputSet::new();
        assert!(claimed.is_empty());
        assert_eq!(claimed.claim("tx1", &outputs), 2);
        assert_eq!(claimed.claim("tx2", &outputs[..1]), 0);
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed.claimant(&outpoint(1, 0)), Some("tx1"));
        assert_eq!(claimed.claimed_by("tx1"), vec![outpoint(1, 0), outpoint(2, 0)]);
        assert!(claimed.claimed_by("tx2").is_empty());
    }
}
