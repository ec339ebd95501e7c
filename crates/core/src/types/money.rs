//! Decimal rounding helpers for invoice amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used when splitting aggregate amounts across tax buckets.
///
/// Four places keep the per-bucket drift below the bucket boundary when the
/// split amounts are summed back up.
pub const APPORTION_DECIMALS: u32 = 4;

/// Round half-up to the given number of decimal places.
///
/// Midpoints round away from zero, matching how the platform rounds order
/// totals before display.
#[must_use]
pub fn round_half_up(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to the apportionment precision.
#[must_use]
pub fn round_apportioned(value: Decimal) -> Decimal {
    round_half_up(value, APPORTION_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up_midpoint() {
        assert_eq!(round_half_up(Decimal::new(2345, 3), 2), Decimal::new(235, 2));
        assert_eq!(round_half_up(Decimal::new(2344, 3), 2), Decimal::new(234, 2));
        assert_eq!(round_half_up(Decimal::new(-2345, 3), 2), Decimal::new(-235, 2));
    }

    #[test]
    fn test_round_is_idempotent() {
        let once = round_half_up(Decimal::new(1_999_499, 5), 2);
        let twice = round_half_up(once, 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apportion_precision() {
        assert_eq!(round_apportioned(Decimal::new(123_456, 5)), Decimal::new(12346, 4));
        assert_eq!(round_apportioned(Decimal::new(12, 1)), Decimal::new(12, 1));
    }
}
