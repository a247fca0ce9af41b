//! Shared data structures used throughout the application.

use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::fmt;

/// One side of the pair. `A` is the pool's token0, `B` its token1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenId {
    A,
    B,
}

impl TokenId {
    pub fn other(self) -> Self {
        match self {
            TokenId::A => TokenId::B,
            TokenId::B => TokenId::A,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenId::A => write!(f, "A"),
            TokenId::B => write!(f, "B"),
        }
    }
}

/// Direction of a corrective swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SwapDirection {
    /// Sell A, buy B.
    AToB,
    /// Sell B, buy A.
    BToA,
    #[default]
    None,
}

impl SwapDirection {
    /// Direction that sells `token`.
    pub fn selling(token: TokenId) -> Self {
        match token {
            TokenId::A => SwapDirection::AToB,
            TokenId::B => SwapDirection::BToA,
        }
    }

    pub fn sell_token(self) -> Option<TokenId> {
        match self {
            SwapDirection::AToB => Some(TokenId::A),
            SwapDirection::BToA => Some(TokenId::B),
            SwapDirection::None => None,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::AToB => write!(f, "A->B"),
            SwapDirection::BToA => write!(f, "B->A"),
            SwapDirection::None => write!(f, "none"),
        }
    }
}

/// Output obtained for `units_in` of `of_token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub of_token: TokenId,
    pub units_in: U256,
    pub units_out: U256,
}

/// The single decision artifact of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub sell_token: TokenId,
    pub buy_token: TokenId,
    pub amount_in: U256,
}

impl SwapPlan {
    pub fn new(sell_token: TokenId, amount_in: U256) -> Self {
        Self {
            sell_token,
            buy_token: sell_token.other(),
            amount_in,
        }
    }

    pub fn direction(&self) -> SwapDirection {
        SwapDirection::selling(self.sell_token)
    }
}

/// Pool mutations that trigger a decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    LiquidityAdded,
    LiquidityRemoved,
    SwapOccurred { initiator: Address },
}

impl fmt::Display for PoolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolEvent::LiquidityAdded => write!(f, "liquidity added"),
            PoolEvent::LiquidityRemoved => write!(f, "liquidity removed"),
            PoolEvent::SwapOccurred { initiator } => write!(f, "swap by {initiator:?}"),
        }
    }
}

/// Receipt data of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}
