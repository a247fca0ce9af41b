use crate::models::TokenId;
use ethers::types::U256;
use std::time::SystemTime;

/// Immutable snapshot of the pair reserves, fetched fresh for every cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReserveSnapshot {
    /// Reserve of token A (pair token0), raw units.
    pub reserve_a: U256,
    /// Reserve of token B (pair token1), raw units.
    pub reserve_b: U256,
    /// `blockTimestampLast` reported by the pair.
    pub last_update: u32,
    /// Local time the snapshot was read.
    pub captured_at: SystemTime,
}

impl ReserveSnapshot {
    pub fn new(reserve_a: U256, reserve_b: U256, last_update: u32) -> Self {
        Self {
            reserve_a,
            reserve_b,
            last_update,
            captured_at: SystemTime::now(),
        }
    }

    pub fn reserve_of(&self, token: TokenId) -> U256 {
        match token {
            TokenId::A => self.reserve_a,
            TokenId::B => self.reserve_b,
        }
    }

    /// `(reserve_in, reserve_out)` when selling `token` into the pool.
    pub fn reserves_for_sale(&self, token: TokenId) -> (U256, U256) {
        (self.reserve_of(token), self.reserve_of(token.other()))
    }

    /// An empty side makes every price undefined.
    pub fn is_degenerate(&self) -> bool {
        self.reserve_a.is_zero() || self.reserve_b.is_zero()
    }
}
