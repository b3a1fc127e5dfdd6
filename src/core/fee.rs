//! Fee policies for withdrawal transactions
//!
//! Every node must arrive at the same fee for the same inputs, so a policy
//! is a pure function of the transaction shape. No estimation from mempool
//! state happens here.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

// =============================================================================
// Constants
// =============================================================================

/// Fixed withdrawal fee in satoshis
pub const MIN_FEE: u64 = 1_000;

/// Estimated size of a P2SH multisig input in bytes
pub const BYTES_PER_INPUT: u64 = 180;

/// Estimated size of an output in bytes
pub const BYTES_PER_OUTPUT: u64 = 34;

/// Version, counts and lock time
pub const TX_OVERHEAD_BYTES: u64 = 10;

/// Outputs of a withdrawal: destination and change
pub const WITHDRAWAL_OUTPUTS: usize = 2;

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate in satoshis per byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    /// Create from satoshis per byte
    pub fn from_sat_per_byte(rate: u64) -> Self {
        Self(rate)
    }

    /// Calculate fee for a given size, saturating at `u64::MAX`
    pub fn fee_for_size(&self, size_bytes: u64) -> u64 {
        self.0.saturating_mul(size_bytes)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(1)
    }
}

// =============================================================================
// Fee Policy
// =============================================================================

/// Computes the fee a withdrawal pays
pub trait FeePolicy: Debug + Send + Sync {
    /// Fee for a transaction with the given number of inputs and outputs
    fn fee(&self, inputs: usize, outputs: usize) -> u64;

    /// Outputs (and withdrawal amounts) below this value are not worth spending
    fn dust_limit(&self) -> u64 {
        0
    }
}

/// Constant fee regardless of transaction size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFee(pub u64);

impl Default for FixedFee {
    fn default() -> Self {
        Self(MIN_FEE)
    }
}

impl FeePolicy for FixedFee {
    fn fee(&self, _inputs: usize, _outputs: usize) -> u64 {
        self.0
    }
}

/// Fee proportional to the estimated serialized size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeEstimateFee {
    pub rate: FeeRate,
}

impl SizeEstimateFee {
    pub fn new(rate: FeeRate) -> Self {
        Self { rate }
    }

    /// Estimated size of a transaction in bytes
    pub fn estimate_size(inputs: usize, outputs: usize) -> u64 {
        TX_OVERHEAD_BYTES
            .saturating_add((inputs as u64).saturating_mul(BYTES_PER_INPUT))
            .saturating_add((outputs as u64).saturating_mul(BYTES_PER_OUTPUT))
    }
}

impl FeePolicy for SizeEstimateFee {
    fn fee(&self, inputs: usize, outputs: usize) -> u64 {
        self.rate.fee_for_size(Self::estimate_size(inputs, outputs))
    }

    fn dust_limit(&self) -> u64 {
        self.rate.fee_for_size(BYTES_PER_INPUT)
    }
}
