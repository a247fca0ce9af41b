use crate::config::ChainConfig;
use crate::dex::state::ReserveSnapshot;
use crate::dex::{BalanceProvider, Executor, QuoteProvider, ReserveProvider};
use crate::errors::{AppError, Result, SignerClient};
use crate::models::{SwapPlan, TokenId, TxConfirmation};
use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::{ContractCall, abigen},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, U64, U256},
};
use std::sync::Arc;
use tracing::{debug, info};

abigen!(
    UniswapV2Pair,
    r"[
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
        function token0() external view returns (address)
        function token1() external view returns (address)
        event Mint(address indexed sender, uint256 amount0, uint256 amount1)
        event Burn(address indexed sender, uint256 amount0, uint256 amount1, address indexed to)
        event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to)
    ]",
);

abigen!(
    UniswapV2Router,
    r"[
        function getAmountOut(uint256 amountIn, uint256 reserveIn, uint256 reserveOut) external pure returns (uint256 amountOut)
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts)
    ]",
);

abigen!(
    Erc20,
    r"[
        function balanceOf(address owner) external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
    ]",
);

/// Handle for the pair, its router and both tokens, signing as the agent wallet.
#[derive(Clone)]
pub struct PairClient {
    client: Arc<SignerClient>,
    pair: UniswapV2Pair<SignerClient>,
    router: UniswapV2Router<SignerClient>,
    token_a: Erc20<SignerClient>,
    token_b: Erc20<SignerClient>,
    gas_multiplier: u64,
}

impl PairClient {
    pub async fn new(chain: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())?;
        let wallet = chain
            .private_key
            .parse::<LocalWallet>()?
            .with_chain_id(chain.chain_id);
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        let pair = UniswapV2Pair::new(chain.pair_address, client.clone());
        // sanity-check: A/B must be the pair's token0/token1
        let token0 = pair.token_0().call().await?;
        let token1 = pair.token_1().call().await?;
        if token0 != chain.token_a || token1 != chain.token_b {
            return Err(AppError::Config(format!(
                "pair tokens are {token0:?}/{token1:?}, configured A/B are {:?}/{:?}",
                chain.token_a, chain.token_b
            )));
        }

        Ok(Self {
            router: UniswapV2Router::new(chain.router_address, client.clone()),
            token_a: Erc20::new(chain.token_a, client.clone()),
            token_b: Erc20::new(chain.token_b, client.clone()),
            pair,
            client,
            gas_multiplier: chain.gas_multiplier,
        })
    }

    pub fn wallet_address(&self) -> Address {
        self.client.address()
    }

    fn token(&self, token: TokenId) -> &Erc20<SignerClient> {
        match token {
            TokenId::A => &self.token_a,
            TokenId::B => &self.token_b,
        }
    }
}

/// Submits `call` and waits for a successful receipt.
async fn send_and_confirm<D: Detokenize>(
    call: ContractCall<SignerClient, D>,
    label: &str,
) -> Result<TxConfirmation> {
    let pending = call
        .send()
        .await
        .map_err(|e| AppError::Execution(format!("{label} submission failed: {e}")))?;
    let tx_hash = pending.tx_hash();
    info!(label, ?tx_hash, "[EXEC] transaction submitted");

    let receipt = pending
        .await
        .map_err(|e| AppError::Execution(format!("{label} confirmation failed: {e}")))?
        .ok_or_else(|| AppError::Execution(format!("{label} dropped before confirmation")))?;
    if receipt.status != Some(U64::from(1)) {
        return Err(AppError::Execution(format!("{label} reverted in {tx_hash:?}")));
    }

    let block_number = receipt.block_number.map(|b| b.as_u64());
    debug!(label, ?tx_hash, ?block_number, "[EXEC] transaction confirmed");
    Ok(TxConfirmation {
        tx_hash,
        block_number,
    })
}

#[async_trait]
impl ReserveProvider for PairClient {
    async fn get_reserves(&self) -> Result<ReserveSnapshot> {
        let (reserve0, reserve1, last_update) = self.pair.get_reserves().call().await?;
        Ok(ReserveSnapshot::new(
            U256::from(reserve0),
            U256::from(reserve1),
            last_update,
        ))
    }
}

#[async_trait]
impl QuoteProvider for PairClient {
    async fn get_amount_out(
        &self,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        Ok(self
            .router
            .get_amount_out(amount_in, reserve_in, reserve_out)
            .call()
            .await?)
    }
}

#[async_trait]
impl BalanceProvider for PairClient {
    async fn balance_of(&self, token: TokenId) -> Result<U256> {
        Ok(self
            .token(token)
            .balance_of(self.wallet_address())
            .call()
            .await?)
    }
}

#[async_trait]
impl Executor for PairClient {
    async fn allowance(&self, token: TokenId) -> Result<U256> {
        Ok(self
            .token(token)
            .allowance(self.wallet_address(), self.router.address())
            .call()
            .await?)
    }

    async fn approve(&self, token: TokenId, amount: U256) -> Result<TxConfirmation> {
        let call = self.token(token).approve(self.router.address(), amount);
        send_and_confirm(call, "approve").await
    }

    async fn swap(
        &self,
        plan: &SwapPlan,
        min_amount_out: U256,
        deadline: U256,
    ) -> Result<TxConfirmation> {
        let gas_price = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| AppError::Execution(format!("gas price lookup failed: {e}")))?;
        let path = vec![
            self.token(plan.sell_token).address(),
            self.token(plan.buy_token).address(),
        ];
        let call = self
            .router
            .swap_exact_tokens_for_tokens(
                plan.amount_in,
                min_amount_out,
                path,
                self.wallet_address(),
                deadline,
            )
            .gas_price(gas_price * U256::from(self.gas_multiplier));
        send_and_confirm(call, "swap").await
    }
}
