//! Conversion between human-readable prices and token base units.
//!
//! Dataset prices are published as decimal strings in the payment token's
//! human units (`"2.50"`). On-chain transfers carry integer base units
//! (`2_500_000` at 6 decimals). The conversion floors: a price with more
//! precision than the mint supports never rounds up into a larger charge.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

/// Errors converting a price string to base units.
#[derive(Debug, thiserror::Error)]
pub enum AmountError {
    /// The price string is not a decimal number.
    #[error("invalid price {0:?}")]
    InvalidPrice(String),
    /// The price is negative.
    #[error("negative price {0:?}")]
    NegativePrice(String),
    /// The mint's decimal count cannot be represented.
    #[error("unsupported mint decimals {0}")]
    UnsupportedDecimals(u8),
    /// The scaled amount does not fit in a `u64`.
    #[error("price {0:?} overflows u64 base units")]
    Overflow(String),
}

/// Converts a human-unit price to base units, flooring to an integer.
///
/// This is the single definition of "the expected raw amount" used both when
/// assembling a draft transfer and when validating a settled one; both sides
/// must agree to the unit.
///
/// # Errors
///
/// Returns [`AmountError`] on malformed, negative, or overflowing prices.
pub fn price_to_base_units(price: &str, decimals: u8) -> Result<u64, AmountError> {
    let price_dec =
        Decimal::from_str(price.trim()).map_err(|_| AmountError::InvalidPrice(price.into()))?;
    if price_dec.is_sign_negative() {
        return Err(AmountError::NegativePrice(price.into()));
    }
    let scale = scale_factor(decimals)?;
    let scaled = price_dec
        .checked_mul(scale)
        .ok_or_else(|| AmountError::Overflow(price.into()))?;
    scaled
        .floor()
        .to_u64()
        .ok_or_else(|| AmountError::Overflow(price.into()))
}

/// Renders base units back into a human-unit decimal string.
///
/// Used by the transaction history endpoint to report amounts in the same
/// units the catalog publishes prices in.
///
/// # Errors
///
/// Returns [`AmountError::UnsupportedDecimals`] if `decimals` exceeds what a
/// `Decimal` scale can express.
pub fn base_units_to_display(amount: u64, decimals: u8) -> Result<String, AmountError> {
    if u32::from(decimals) > Decimal::MAX_SCALE {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    let value = Decimal::from_i128_with_scale(i128::from(amount), u32::from(decimals));
    Ok(value.normalize().to_string())
}

fn scale_factor(decimals: u8) -> Result<Decimal, AmountError> {
    if decimals > 19 {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    let mut factor = 1u64;
    for _ in 0..decimals {
        factor *= 10;
    }
    Ok(Decimal::from(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_2_50_at_6_decimals_is_2500000() {
        assert_eq!(price_to_base_units("2.50", 6).unwrap(), 2_500_000);
    }

    #[test]
    fn conversion_floors_excess_precision() {
        // More fractional digits than the mint supports must round down.
        assert_eq!(price_to_base_units("0.1234567", 6).unwrap(), 123_456);
        assert_eq!(price_to_base_units("1.9999999", 6).unwrap(), 1_999_999);
    }

    #[test]
    fn integer_prices_scale_exactly() {
        assert_eq!(price_to_base_units("10", 6).unwrap(), 10_000_000);
        assert_eq!(price_to_base_units("0", 6).unwrap(), 0);
    }

    #[test]
    fn zero_decimals_passes_through() {
        assert_eq!(price_to_base_units("42", 0).unwrap(), 42);
        assert_eq!(price_to_base_units("42.9", 0).unwrap(), 42);
    }

    #[test]
    fn malformed_and_negative_prices_fail() {
        assert!(matches!(
            price_to_base_units("2,50", 6),
            Err(AmountError::InvalidPrice(_))
        ));
        assert!(matches!(
            price_to_base_units("-1", 6),
            Err(AmountError::NegativePrice(_))
        ));
    }

    #[test]
    fn display_renders_human_units() {
        assert_eq!(base_units_to_display(2_500_000, 6).unwrap(), "2.5");
        assert_eq!(base_units_to_display(0, 6).unwrap(), "0");
        assert_eq!(base_units_to_display(1, 6).unwrap(), "0.000001");
    }

    #[test]
    fn display_and_parse_agree() {
        let raw = price_to_base_units("7.125", 6).unwrap();
        assert_eq!(base_units_to_display(raw, 6).unwrap(), "7.125");
    }
}
