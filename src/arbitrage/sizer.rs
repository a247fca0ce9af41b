//! Trade sizing against the constant-product curve.
//!
//! Two closed forms are available and the configured [`SizingPolicy`] picks
//! exactly one of them; there is no fallback between them.
//!
//! * `ProfitMaximizing` (default): selling `a` of the input token returns
//!   `γ·a·rOut / (rIn + γ·a)` at parity value, so profit is maximal where
//!   `rIn + γ·a = sqrt(γ·rIn·rOut)`. With `γ = n/d`:
//!   `a = (isqrt(n·d·rIn·rOut) − d·rIn) / n`.
//! * `ImpactBound`: after selling `a`, the marginal price of the input token
//!   scales by `rIn² / ((rIn + γ·a)(rIn + a))`. Requiring this to stay at or
//!   above `1 − m/100` gives the quadratic
//!   `n·a² + (n + d)·rIn·a − d·rIn²·m/(100 − m) ≤ 0`, whose positive root is
//!   `a = rIn·(sqrt((n + d)² + 4·n·d·m/(100 − m)) − (n + d)) / (2n)`.
//!
//! Both results are floored and then re-checked against their defining
//! inequality.

use crate::dex::calc::{Fee, decimal_to_u256_floor, u256_to_decimal};
use crate::dex::state::ReserveSnapshot;
use crate::errors::SizingError;
use crate::models::TokenId;
use bigdecimal::BigDecimal;
use ethers::types::U256;
use num_traits::Zero;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SizingPolicy {
    #[default]
    ProfitMaximizing,
    ImpactBound,
}

impl SizingPolicy {
    pub fn label(self) -> &'static str {
        match self {
            SizingPolicy::ProfitMaximizing => "profit-maximizing",
            SizingPolicy::ImpactBound => "impact-bound",
        }
    }
}

impl fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SizingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profit-maximizing" | "profit_maximizing" | "profit" => {
                Ok(SizingPolicy::ProfitMaximizing)
            }
            "impact-bound" | "impact_bound" | "impact" => Ok(SizingPolicy::ImpactBound),
            other => Err(format!("unknown sizing policy `{other}`")),
        }
    }
}

/// Policy-driven sizer used by the orchestrator.
#[derive(Debug, Clone)]
pub struct TradeSizer {
    pub policy: SizingPolicy,
    pub fee: Fee,
    pub max_impact_percent: BigDecimal,
}

impl TradeSizer {
    pub fn new(policy: SizingPolicy, fee: Fee, max_impact_percent: BigDecimal) -> Self {
        Self {
            policy,
            fee,
            max_impact_percent,
        }
    }

    /// Largest amount of `sell_token` the policy allows for this snapshot.
    pub fn max_amount_in(
        &self,
        snapshot: &ReserveSnapshot,
        sell_token: TokenId,
    ) -> Result<U256, SizingError> {
        let (reserve_in, reserve_out) = snapshot.reserves_for_sale(sell_token);
        match self.policy {
            SizingPolicy::ProfitMaximizing => {
                profit_maximizing_amount(reserve_in, reserve_out, self.fee)
            }
            SizingPolicy::ImpactBound => {
                max_trade_for_impact(reserve_in, &self.max_impact_percent, self.fee)
            }
        }
    }
}

fn check_fee(fee: Fee) -> Result<(), SizingError> {
    if fee.is_valid() {
        Ok(())
    } else {
        Err(SizingError::InvalidFee {
            numerator: fee.numerator,
            denominator: fee.denominator,
        })
    }
}

/// Input amount that maximizes the value returned by the pool at 1:1 parity.
///
/// Zero when selling this token is not profitable.
pub fn profit_maximizing_amount(
    reserve_in: U256,
    reserve_out: U256,
    fee: Fee,
) -> Result<U256, SizingError> {
    check_fee(fee)?;
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SizingError::EmptyReserve);
    }
    let n = U256::from(fee.numerator);
    let d = U256::from(fee.denominator);

    let product = n
        .checked_mul(d)
        .and_then(|nd| nd.checked_mul(reserve_in))
        .and_then(|v| v.checked_mul(reserve_out))
        .ok_or(SizingError::Overflow)?;
    let root = product.integer_sqrt();
    let base = d.checked_mul(reserve_in).ok_or(SizingError::Overflow)?;
    if root <= base {
        return Ok(U256::zero());
    }
    let amount = (root - base) / n;

    // (n·a + d·rIn)² must not pass n·d·rIn·rOut
    let within = |a: U256| -> Result<bool, SizingError> {
        let lhs = n
            .checked_mul(a)
            .and_then(|v| v.checked_add(base))
            .ok_or(SizingError::Overflow)?;
        Ok(lhs.checked_mul(lhs).is_some_and(|sq| sq <= product))
    };
    confirm(amount, "profit-maximizing", within)
}

/// Largest input that keeps the marginal price drop of the sold token within
/// `max_impact_percent`.
pub fn max_trade_for_impact(
    reserve_in: U256,
    max_impact_percent: &BigDecimal,
    fee: Fee,
) -> Result<U256, SizingError> {
    check_fee(fee)?;
    if reserve_in.is_zero() {
        return Err(SizingError::EmptyReserve);
    }
    let hundred = BigDecimal::from(100);
    if *max_impact_percent <= BigDecimal::zero() || *max_impact_percent >= hundred {
        return Err(SizingError::InvalidImpact(max_impact_percent.to_string()));
    }

    let m = max_impact_percent;
    let n = BigDecimal::from(fee.numerator);
    let d = BigDecimal::from(fee.denominator);
    let r = u256_to_decimal(reserve_in);
    let n_plus_d = &n + &d;

    let headroom = &hundred - m;
    let discriminant =
        &n_plus_d * &n_plus_d + BigDecimal::from(4) * &n * &d * m / &headroom;
    let root = discriminant
        .sqrt()
        .ok_or_else(|| SizingError::Undefined(format!("sqrt of {discriminant}")))?;
    let raw = &r * (root - &n_plus_d) / (BigDecimal::from(2) * &n);
    if raw < BigDecimal::zero() {
        return Err(SizingError::Undefined(format!("negative amount {raw}")));
    }
    let amount = decimal_to_u256_floor(&raw).ok_or(SizingError::Overflow)?;

    // (100 − m)·(n·a² + (n + d)·rIn·a) ≤ d·m·rIn²
    let bound = &d * m * &r * &r;
    let within = |a: U256| -> Result<bool, SizingError> {
        let a = u256_to_decimal(a);
        let lhs = &headroom * (&n * &a * &a + &n_plus_d * &r * &a);
        Ok(lhs <= bound)
    };
    confirm(amount, "impact-bound", within)
}

/// Accepts `amount`, or one unit less when flooring landed on the wrong side.
fn confirm<F>(amount: U256, policy: &'static str, within: F) -> Result<U256, SizingError>
where
    F: Fn(U256) -> Result<bool, SizingError>,
{
    if within(amount)? {
        return Ok(amount);
    }
    if !amount.is_zero() {
        let stepped = amount - U256::one();
        if within(stepped)? {
            return Ok(stepped);
        }
    }
    Err(SizingError::Contradiction {
        policy,
        amount: amount.to_string(),
    })
}
