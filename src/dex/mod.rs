//! Pool access for a Uniswap V2 style pair.
//!
//! The decision core only talks to the traits below; `client` implements
//! them against a live chain.

use crate::errors::Result;
use crate::models::{SwapPlan, TokenId, TxConfirmation};
use async_trait::async_trait;
use ethers::types::U256;

pub mod calc;
pub mod client;
pub mod state;

pub use calc::{Fee, get_amount_out, price_of, quote_pair};
pub use client::PairClient;
pub use state::ReserveSnapshot;

#[async_trait]
pub trait ReserveProvider: Send + Sync {
    /// Current reserves; never cached between calls.
    async fn get_reserves(&self) -> Result<ReserveSnapshot>;
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// The router's own `getAmountOut`.
    async fn get_amount_out(
        &self,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256>;
}

#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Agent wallet balance of `token`.
    async fn balance_of(&self, token: TokenId) -> Result<U256>;
}

/// Writes on behalf of the agent wallet. Both calls resolve only after the
/// transaction is mined successfully.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Allowance granted to the router for `token`.
    async fn allowance(&self, token: TokenId) -> Result<U256>;

    /// Approve the router to spend `amount` of `token`.
    async fn approve(&self, token: TokenId, amount: U256) -> Result<TxConfirmation>;

    async fn swap(
        &self,
        plan: &SwapPlan,
        min_amount_out: U256,
        deadline: U256,
    ) -> Result<TxConfirmation>;
}

/// Everything a decision cycle needs from the outside world.
pub trait PoolGateway: ReserveProvider + QuoteProvider + BalanceProvider + Executor {}

impl<T> PoolGateway for T where T: ReserveProvider + QuoteProvider + BalanceProvider + Executor {}
