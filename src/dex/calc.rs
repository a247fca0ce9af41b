//! Constant-product pricing with a multiplicative input fee.
//!
//! Every on-chain quantity stays in `U256` with floor division so results
//! match the pair contract bit for bit. Ratios are compared as `BigDecimal`.

use crate::dex::state::ReserveSnapshot;
use crate::models::{PriceQuote, TokenId};
use bigdecimal::BigDecimal;
use ethers::types::U256;
use num_bigint::{BigInt, BigUint, Sign};

/// Fee expressed as the fraction of input that reaches the curve,
/// e.g. 997/1000 for a 0.3% pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fee {
    pub numerator: u64,
    pub denominator: u64,
}

impl Fee {
    pub const UNISWAP_V2: Fee = Fee {
        numerator: 997,
        denominator: 1000,
    };

    pub fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// A usable fee keeps a non-zero share of the input and never more than all of it.
    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0 && self.numerator <= self.denominator
    }
}

impl Default for Fee {
    fn default() -> Self {
        Fee::UNISWAP_V2
    }
}

/// `floor(amountIn * n * reserveOut / (reserveIn * d + amountIn * n))`.
///
/// Returns `None` for an empty reserve or on overflow.
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee: Fee,
) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return None;
    }
    let amount_in_with_fee = amount_in.checked_mul(U256::from(fee.numerator))?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in
        .checked_mul(U256::from(fee.denominator))?
        .checked_add(amount_in_with_fee)?;
    Some(numerator / denominator)
}

/// Spot price surrogate of `token`: what `reference` units of it buy from the pool.
pub fn price_of(
    snapshot: &ReserveSnapshot,
    token: TokenId,
    reference: U256,
    fee: Fee,
) -> Option<PriceQuote> {
    let (reserve_in, reserve_out) = snapshot.reserves_for_sale(token);
    let units_out = get_amount_out(reference, reserve_in, reserve_out, fee)?;
    Some(PriceQuote {
        of_token: token,
        units_in: reference,
        units_out,
    })
}

/// Both directional quotes, `(price of A, price of B)`.
pub fn quote_pair(
    snapshot: &ReserveSnapshot,
    reference: U256,
    fee: Fee,
) -> Option<(PriceQuote, PriceQuote)> {
    if snapshot.is_degenerate() {
        return None;
    }
    Some((
        price_of(snapshot, TokenId::A, reference, fee)?,
        price_of(snapshot, TokenId::B, reference, fee)?,
    ))
}

/// Reserves after selling `amount_in` of `token` into the pool.
pub fn apply_swap(
    snapshot: &ReserveSnapshot,
    token: TokenId,
    amount_in: U256,
    fee: Fee,
) -> Option<ReserveSnapshot> {
    let (reserve_in, reserve_out) = snapshot.reserves_for_sale(token);
    let out = get_amount_out(amount_in, reserve_in, reserve_out, fee)?;
    let new_in = reserve_in.checked_add(amount_in)?;
    let new_out = reserve_out.checked_sub(out)?;
    let (reserve_a, reserve_b) = match token {
        TokenId::A => (new_in, new_out),
        TokenId::B => (new_out, new_in),
    };
    Some(ReserveSnapshot::new(reserve_a, reserve_b, snapshot.last_update))
}

// ---------- conversions ----------

pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

pub fn u256_to_decimal(value: U256) -> BigDecimal {
    BigDecimal::new(BigInt::from(u256_to_biguint(value)), 0)
}

/// Truncates toward zero. `None` for negative values or anything wider than 256 bits.
pub fn decimal_to_u256_floor(value: &BigDecimal) -> Option<U256> {
    let (int, _) = value.with_scale(0).into_bigint_and_exponent();
    match int.sign() {
        Sign::Minus => None,
        Sign::NoSign => Some(U256::zero()),
        Sign::Plus => {
            let bytes = int.magnitude().to_bytes_be();
            if bytes.len() > 32 {
                return None;
            }
            Some(U256::from_big_endian(&bytes))
        }
    }
}
