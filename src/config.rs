//! Configuration loader and application settings.

use crate::arbitrage::sizer::SizingPolicy;
use crate::arbitrage::types::ImpactPolicy;
use crate::dex::calc::Fee;
use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use ethers::types::{Address, U256};
use num_traits::Zero;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Largest scale whose unit, `10^decimals`, still fits in a `U256`.
const MAX_TOKEN_DECIMALS: u32 = 77;

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub agent: AgentConfig,
}

/// Where the pool lives and who trades on it.
#[derive(Clone)]
pub struct ChainConfig {
    /// HTTP endpoint for reads and transactions.
    pub rpc_url: Url,
    /// WebSocket endpoint for pool event subscriptions.
    pub ws_url: Url,
    pub private_key: String,
    pub chain_id: u64,
    pub pair_address: Address,
    pub router_address: Address,
    /// Pair token0.
    pub token_a: Address,
    /// Pair token1.
    pub token_b: Address,
    /// Gas price multiplier applied to swap transactions.
    pub gas_multiplier: u64,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("ws_url", &self.ws_url.as_str())
            .field("private_key", &"<redacted>")
            .field("chain_id", &self.chain_id)
            .field("pair_address", &self.pair_address)
            .field("router_address", &self.router_address)
            .field("token_a", &self.token_a)
            .field("token_b", &self.token_b)
            .field("gas_multiplier", &self.gas_multiplier)
            .finish()
    }
}

/// Read-only decision parameters, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Price ratio that triggers a swap, strictly above 1.
    pub threshold_ratio: BigDecimal,
    /// Allowed price impact in percent, strictly inside (0, 100).
    pub max_price_impact_percent: BigDecimal,
    pub fee: Fee,
    /// Raw input units used for the spot price surrogate.
    pub reference_amount: U256,
    /// Fixed trade size; `None` trades the wallet balance.
    pub fixed_amount: Option<U256>,
    pub sizing_policy: SizingPolicy,
    pub impact_policy: ImpactPolicy,
    pub min_amount_out: U256,
    pub deadline_secs: u64,
    /// Cross-check the oracle against the router's `getAmountOut`.
    pub verify_quotes: bool,
    /// Display scale for logs only.
    pub token_decimals: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: BigDecimal::new(1001.into(), 3),
            max_price_impact_percent: BigDecimal::from(1),
            fee: Fee::UNISWAP_V2,
            reference_amount: U256::exp10(6),
            fixed_amount: None,
            sizing_policy: SizingPolicy::default(),
            impact_policy: ImpactPolicy::default(),
            min_amount_out: U256::one(),
            deadline_secs: 600,
            verify_quotes: true,
            token_decimals: 6,
        }
    }
}

impl AgentConfig {
    /// Rejects parameter combinations no cycle could run with.
    pub fn validate(&self) -> Result<()> {
        if self.threshold_ratio <= BigDecimal::from(1) {
            return Err(AppError::Config(format!(
                "SWAP_THRESHOLD must be greater than 1, got {}",
                self.threshold_ratio
            )));
        }
        if self.max_price_impact_percent <= BigDecimal::zero()
            || self.max_price_impact_percent >= BigDecimal::from(100)
        {
            return Err(AppError::Config(format!(
                "MAX_PRICE_IMPACT must be inside (0, 100), got {}",
                self.max_price_impact_percent
            )));
        }
        if !self.fee.is_valid() || self.fee.numerator == self.fee.denominator {
            return Err(AppError::Config(format!(
                "fee {}/{} must satisfy 0 < numerator < denominator",
                self.fee.numerator, self.fee.denominator
            )));
        }
        if self.reference_amount.is_zero() {
            return Err(AppError::Config("REFERENCE_AMOUNT must be positive".into()));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{key} is not set")))
        };

        let chain = ChainConfig {
            rpc_url: Url::parse(&required("RPC_URL")?)?,
            ws_url: Url::parse(&required("WS_URL")?)?,
            private_key: required("PRIVATE_KEY")?,
            chain_id: parse_or(get("CHAIN_ID"), "CHAIN_ID", 1u64)?,
            pair_address: parse_address(&required("PAIR_ADDRESS")?, "PAIR_ADDRESS")?,
            router_address: parse_address(&required("ROUTER_ADDRESS")?, "ROUTER_ADDRESS")?,
            token_a: parse_address(&required("TOKEN_A_ADDRESS")?, "TOKEN_A_ADDRESS")?,
            token_b: parse_address(&required("TOKEN_B_ADDRESS")?, "TOKEN_B_ADDRESS")?,
            gas_multiplier: parse_or(get("GAS_MULTIPLIER"), "GAS_MULTIPLIER", 1u64)?,
        };
        if chain.gas_multiplier == 0 {
            return Err(AppError::Config("GAS_MULTIPLIER must be at least 1".into()));
        }

        let token_decimals: u32 = parse_or(get("TOKEN_DECIMALS"), "TOKEN_DECIMALS", 6u32)?;
        if token_decimals > MAX_TOKEN_DECIMALS {
            return Err(AppError::Config(format!(
                "TOKEN_DECIMALS must be at most {MAX_TOKEN_DECIMALS}, got {token_decimals}"
            )));
        }
        let reference_amount = match get("REFERENCE_AMOUNT") {
            Some(raw) => parse_u256(&raw, "REFERENCE_AMOUNT")?,
            None => U256::exp10(token_decimals as usize),
        };
        let fixed_amount = match get("AMOUNT") {
            Some(raw) => Some(parse_u256(&raw, "AMOUNT")?).filter(|a| !a.is_zero()),
            None => None,
        };
        let min_amount_out = match get("MIN_AMOUNT_OUT") {
            Some(raw) => parse_u256(&raw, "MIN_AMOUNT_OUT")?,
            None => U256::one(),
        };

        let agent = AgentConfig {
            threshold_ratio: BigDecimal::from_str(&required("SWAP_THRESHOLD")?)?,
            max_price_impact_percent: match get("MAX_PRICE_IMPACT") {
                Some(raw) => BigDecimal::from_str(&raw)?,
                None => BigDecimal::from(1),
            },
            fee: Fee::new(
                parse_or(get("FEE_NUMERATOR"), "FEE_NUMERATOR", Fee::UNISWAP_V2.numerator)?,
                parse_or(get("FEE_DENOMINATOR"), "FEE_DENOMINATOR", Fee::UNISWAP_V2.denominator)?,
            ),
            reference_amount,
            fixed_amount,
            sizing_policy: parse_or(get("SIZING_POLICY"), "SIZING_POLICY", SizingPolicy::default())?,
            impact_policy: parse_or(get("IMPACT_POLICY"), "IMPACT_POLICY", ImpactPolicy::default())?,
            min_amount_out,
            deadline_secs: parse_or(get("DEADLINE_SECS"), "DEADLINE_SECS", 600u64)?,
            verify_quotes: parse_or(get("VERIFY_QUOTES"), "VERIFY_QUOTES", true)?,
            token_decimals,
        };
        agent.validate()?;

        Ok(Self { chain, agent })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(v) => v
            .parse()
            .map_err(|e| AppError::Config(format!("{key}: invalid value `{v}`: {e}"))),
        None => Ok(default),
    }
}

fn parse_address(raw: &str, key: &str) -> Result<Address> {
    Address::from_str(raw).map_err(|e| AppError::Config(format!("{key}: {e}")))
}

fn parse_u256(raw: &str, key: &str) -> Result<U256> {
    U256::from_dec_str(raw).map_err(|e| AppError::Config(format!("{key}: {e:?}")))
}
