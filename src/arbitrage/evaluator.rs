use crate::dex::calc::u256_to_decimal;
use crate::models::{PriceQuote, SwapDirection, TokenId};
use bigdecimal::BigDecimal;
use ethers::types::U256;

/// True when either price exceeds the other by at least `threshold_ratio`.
///
/// Two zero prices never trigger. A quote that floors to zero against a
/// positive one (reserves more than about `reference` times apart) is a
/// divergence past any threshold.
pub fn threshold_reached(price_a: U256, price_b: U256, threshold_ratio: &BigDecimal) -> bool {
    if price_a.is_zero() && price_b.is_zero() {
        return false;
    }
    let a = u256_to_decimal(price_a);
    let b = u256_to_decimal(price_b);
    a >= &b * threshold_ratio || b >= &a * threshold_ratio
}

/// The token whose quote is higher by the threshold ratio, if any.
pub fn expensive_token(
    price_a: &PriceQuote,
    price_b: &PriceQuote,
    threshold_ratio: &BigDecimal,
) -> Option<TokenId> {
    if !threshold_reached(price_a.units_out, price_b.units_out, threshold_ratio) {
        return None;
    }
    let a = u256_to_decimal(price_a.units_out);
    let b = u256_to_decimal(price_b.units_out);
    if a >= &b * threshold_ratio {
        Some(TokenId::A)
    } else if b >= &a * threshold_ratio {
        Some(TokenId::B)
    } else {
        None
    }
}

/// The expensive token is the one sold back into the pool. With one quote
/// floored to zero, the token with the positive quote is the expensive one.
pub fn select_direction(
    price_a: &PriceQuote,
    price_b: &PriceQuote,
    threshold_ratio: &BigDecimal,
) -> SwapDirection {
    expensive_token(price_a, price_b, threshold_ratio)
        .map(SwapDirection::selling)
        .unwrap_or_default()
}
