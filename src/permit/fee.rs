//! Protocol fee policy

use crate::crypto::Address;
use serde::{Deserialize, Serialize};

/// 100% in basis points
pub const MAX_BASIS_POINTS: u16 = 10_000;

/// How the protocol fee of a transfer is computed
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeeRate {
    /// Fixed amount per transfer
    Flat(u128),
    /// Fraction of the amount, rounded down
    BasisPoints(u16),
}

/// Fee rate and the account that collects it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeePolicy {
    pub rate: FeeRate,
    pub collector: Address,
}

impl FeePolicy {
    pub fn new(rate: FeeRate, collector: Address) -> Self {
        Self { rate, collector }
    }

    /// A policy that charges nothing
    pub fn none() -> Self {
        Self {
            rate: FeeRate::Flat(0),
            collector: Address::ZERO,
        }
    }

    /// Whether the policy ever charges anything
    pub fn charges(&self) -> bool {
        match self.rate {
            FeeRate::Flat(fee) => fee > 0,
            FeeRate::BasisPoints(bps) => bps > 0,
        }
    }

    /// A charging policy needs a real collector
    pub fn is_valid(&self) -> bool {
        let rate_ok = match self.rate {
            FeeRate::Flat(_) => true,
            FeeRate::BasisPoints(bps) => bps <= MAX_BASIS_POINTS,
        };
        rate_ok && !(self.charges() && self.collector.is_zero())
    }

    /// Fee charged on a transfer of `amount`
    ///
    /// A flat fee can exceed `amount`; the caller must reject that case.
    pub fn protocol_fee(&self, amount: u128) -> u128 {
        match self.rate {
            FeeRate::Flat(fee) => fee,
            FeeRate::BasisPoints(bps) => {
                let bps = u128::from(bps);
                let whole = MAX_BASIS_POINTS as u128;
                // floor(amount * bps / 10000) without the intermediate product
                (amount / whole)
                    .saturating_mul(bps)
                    .saturating_add((amount % whole) * bps / whole)
            }
        }
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bps(points: u16) -> FeePolicy {
        FeePolicy::new(FeeRate::BasisPoints(points), Address::new([9; 20]))
    }

    #[test]
    fn test_basis_points_round_down() {
        assert_eq!(bps(100).protocol_fee(500), 5);
        assert_eq!(bps(30).protocol_fee(500), 1);
        assert_eq!(bps(30).protocol_fee(333), 0);
        assert_eq!(bps(10_000).protocol_fee(777), 777);
        assert_eq!(bps(0).protocol_fee(777), 0);
    }

    #[test]
    fn test_no_overflow_on_large_amounts() {
        assert_eq!(bps(10_000).protocol_fee(u128::MAX), u128::MAX);
        assert_eq!(bps(5_000).protocol_fee(u128::MAX), u128::MAX / 2);
    }

    #[test]
    fn test_flat_fee() {
        let policy = FeePolicy::new(FeeRate::Flat(25), Address::new([9; 20]));
        assert_eq!(policy.protocol_fee(500), 25);
        assert_eq!(policy.protocol_fee(10), 25);
    }

    #[test]
    fn test_validity() {
        assert!(bps(10_000).is_valid());
        assert!(!bps(10_001).is_valid());
        assert!(FeePolicy::none().is_valid());
        assert_eq!(FeePolicy::none().protocol_fee(1_000), 0);
    }

    #[test]
    fn test_charging_policy_needs_collector() {
        assert!(!FeePolicy::new(FeeRate::BasisPoints(30), Address::ZERO).is_valid());
        assert!(!FeePolicy::new(FeeRate::Flat(1), Address::ZERO).is_valid());

        // Nothing is ever sent, so no collector is needed
        assert!(FeePolicy::new(FeeRate::BasisPoints(0), Address::ZERO).is_valid());
        assert!(FeePolicy::new(FeeRate::Flat(0), Address::ZERO).is_valid());
    }
}
