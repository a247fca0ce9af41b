use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::{H256, U256};
use stablepair_arb::agent::{Agent, Trigger};
use stablepair_arb::arbitrage::{
    AgentState, CycleOutcome, ImpactPolicy, NoopReason, SizingPolicy, evaluate_and_act,
    profit_maximizing_amount,
};
use stablepair_arb::config::AgentConfig;
use stablepair_arb::dex::calc::{self, Fee};
use stablepair_arb::dex::{
    BalanceProvider, Executor, QuoteProvider, ReserveProvider, ReserveSnapshot,
};
use stablepair_arb::errors::{AppError, Result};
use stablepair_arb::models::{PoolEvent, SwapDirection, SwapPlan, TokenId, TxConfirmation};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// In-memory constant-product pool with an agent wallet.
struct MockPool {
    inner: Mutex<Inner>,
}

struct Inner {
    snapshot: ReserveSnapshot,
    balances: [U256; 2],
    allowances: [U256; 2],
    failing_swaps: usize,
    quote_skew: U256,
    swaps: Vec<SwapPlan>,
    approvals: usize,
}

fn idx(token: TokenId) -> usize {
    match token {
        TokenId::A => 0,
        TokenId::B => 1,
    }
}

impl MockPool {
    fn new(reserve_a: u64, reserve_b: u64, balance_a: u64, balance_b: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot: ReserveSnapshot::new(U256::from(reserve_a), U256::from(reserve_b), 0),
                balances: [U256::from(balance_a), U256::from(balance_b)],
                allowances: [U256::zero(), U256::zero()],
                failing_swaps: 0,
                quote_skew: U256::zero(),
                swaps: Vec::new(),
                approvals: 0,
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    fn swaps(&self) -> Vec<SwapPlan> {
        self.with(|i| i.swaps.clone())
    }
}

#[async_trait]
impl ReserveProvider for MockPool {
    async fn get_reserves(&self) -> Result<ReserveSnapshot> {
        Ok(self.with(|i| i.snapshot.clone()))
    }
}

#[async_trait]
impl QuoteProvider for MockPool {
    async fn get_amount_out(
        &self,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        let out = calc::get_amount_out(amount_in, reserve_in, reserve_out, Fee::UNISWAP_V2)
            .ok_or_else(|| AppError::Other("empty reserve".into()))?;
        Ok(out + self.with(|i| i.quote_skew))
    }
}

#[async_trait]
impl BalanceProvider for MockPool {
    async fn balance_of(&self, token: TokenId) -> Result<U256> {
        Ok(self.with(|i| i.balances[idx(token)]))
    }
}

#[async_trait]
impl Executor for MockPool {
    async fn allowance(&self, token: TokenId) -> Result<U256> {
        Ok(self.with(|i| i.allowances[idx(token)]))
    }

    async fn approve(&self, token: TokenId, amount: U256) -> Result<TxConfirmation> {
        self.with(|i| {
            i.allowances[idx(token)] = amount;
            i.approvals += 1;
        });
        Ok(TxConfirmation {
            tx_hash: H256::repeat_byte(0xaa),
            block_number: Some(1),
        })
    }

    async fn swap(
        &self,
        plan: &SwapPlan,
        min_amount_out: U256,
        _deadline: U256,
    ) -> Result<TxConfirmation> {
        // yield so concurrent cycles would interleave here
        tokio::task::yield_now().await;
        self.with(|i| {
            if i.failing_swaps > 0 {
                i.failing_swaps -= 1;
                return Err(AppError::Execution("swap reverted".into()));
            }
            let sell = idx(plan.sell_token);
            let buy = idx(plan.buy_token);
            if i.allowances[sell] < plan.amount_in || i.balances[sell] < plan.amount_in {
                return Err(AppError::Execution("transfer amount exceeds allowance".into()));
            }
            let (r_in, r_out) = i.snapshot.reserves_for_sale(plan.sell_token);
            let out = calc::get_amount_out(plan.amount_in, r_in, r_out, Fee::UNISWAP_V2)
                .ok_or_else(|| AppError::Execution("empty pool".into()))?;
            if out < min_amount_out {
                return Err(AppError::Execution("insufficient output amount".into()));
            }
            i.snapshot = calc::apply_swap(&i.snapshot, plan.sell_token, plan.amount_in, Fee::UNISWAP_V2)
                .ok_or_else(|| AppError::Execution("overflow".into()))?;
            i.allowances[sell] -= plan.amount_in;
            i.balances[sell] -= plan.amount_in;
            i.balances[buy] += out;
            i.swaps.push(*plan);
            Ok(TxConfirmation {
                tx_hash: H256::repeat_byte(0xbb),
                block_number: Some(2),
            })
        })
    }
}

fn config() -> AgentConfig {
    AgentConfig {
        threshold_ratio: BigDecimal::from_str("1.001").unwrap(),
        ..AgentConfig::default()
    }
}

const SKEWED_A: u64 = 1_200_000_000;
const SKEWED_B: u64 = 1_000_000_000;

#[tokio::test]
async fn equal_reserves_are_a_noop() {
    let pool = MockPool::new(1_000_000_000, 1_000_000_000, 10_000_000, 10_000_000);
    let mut state = AgentState::new();
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::ThresholdNotReached));
    assert!(pool.swaps().is_empty());
}

#[tokio::test]
async fn skewed_pool_sells_the_expensive_token_at_the_optimum() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();

    let expected = profit_maximizing_amount(
        U256::from(SKEWED_B),
        U256::from(SKEWED_A),
        Fee::UNISWAP_V2,
    )
    .unwrap();
    match outcome {
        CycleOutcome::Swapped { plan, .. } => {
            assert_eq!(plan.sell_token, TokenId::B);
            assert_eq!(plan.buy_token, TokenId::A);
            assert_eq!(plan.amount_in, expected);
        }
        other => panic!("expected a swap, got {other:?}"),
    }
    assert_eq!(state.guard.last_direction(), SwapDirection::BToA);

    // reserves moved towards parity
    let after = pool.with(|i| i.snapshot.clone());
    assert!(after.reserve_b > U256::from(SKEWED_B));
    assert!(after.reserve_a < U256::from(SKEWED_A));
    assert_eq!(pool.with(|i| i.approvals), 1);
}

#[tokio::test]
async fn repeated_direction_is_suppressed() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    state.guard.record_swap(SwapDirection::BToA);
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::DirectionSuppressed));
    assert!(pool.swaps().is_empty());
}

#[tokio::test]
async fn reverse_direction_is_not_suppressed() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    state.guard.record_swap(SwapDirection::AToB);
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert!(!outcome.is_noop());
}

#[tokio::test]
async fn empty_wallet_is_insufficient_balance() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 1_000_000_000, 0);
    let mut state = AgentState::new();
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::InsufficientBalance));
    assert_eq!(state.guard.last_direction(), SwapDirection::None);
}

#[tokio::test]
async fn fixed_amount_above_balance_is_insufficient() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        fixed_amount: Some(U256::from(5_000u64)),
        ..config()
    };
    let outcome = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::InsufficientBalance));
}

#[tokio::test]
async fn fixed_amount_within_bound_is_used_as_is() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        fixed_amount: Some(U256::from(4_000_000u64)),
        ..config()
    };
    let outcome = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap();
    match outcome {
        CycleOutcome::Swapped { plan, .. } => assert_eq!(plan.amount_in, U256::from(4_000_000u64)),
        other => panic!("expected a swap, got {other:?}"),
    }
}

#[tokio::test]
async fn reject_policy_refuses_oversized_amount() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        impact_policy: ImpactPolicy::Reject,
        ..config()
    };
    let outcome = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::ExceedsImpactBound));
    assert!(pool.swaps().is_empty());
}

#[tokio::test]
async fn impact_bound_policy_clamps_to_the_impact_limit() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        sizing_policy: SizingPolicy::ImpactBound,
        ..config()
    };
    let expected = stablepair_arb::arbitrage::max_trade_for_impact(
        U256::from(SKEWED_B),
        &cfg.max_price_impact_percent,
        Fee::UNISWAP_V2,
    )
    .unwrap();
    let outcome = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap();
    match outcome {
        CycleOutcome::Swapped { plan, .. } => assert_eq!(plan.amount_in, expected),
        other => panic!("expected a swap, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_swap_leaves_the_guard_untouched() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    pool.with(|i| i.failing_swaps = 1);
    let mut state = AgentState::new();
    let err = evaluate_and_act(&mut state, &pool, &config()).await.unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert_eq!(state.guard.last_direction(), SwapDirection::None);

    // the next cycle is free to retry the same direction
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert!(!outcome.is_noop());
    assert_eq!(state.guard.last_direction(), SwapDirection::BToA);
}

#[tokio::test]
async fn sufficient_allowance_skips_approve() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    pool.with(|i| i.allowances = [U256::MAX, U256::MAX]);
    let mut state = AgentState::new();
    evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert_eq!(pool.with(|i| i.approvals), 0);
    assert_eq!(pool.swaps().len(), 1);
}

#[tokio::test]
async fn diverging_router_quote_aborts_the_cycle() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    pool.with(|i| i.quote_skew = U256::one());
    let mut state = AgentState::new();
    let err = evaluate_and_act(&mut state, &pool, &config()).await.unwrap_err();
    assert!(matches!(err, AppError::QuoteMismatch { .. }));
    assert!(pool.swaps().is_empty());
}

#[tokio::test]
async fn empty_pool_is_a_noop() {
    let pool = MockPool::new(0, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let outcome = evaluate_and_act(&mut state, &pool, &config()).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::EmptyPool));
}

#[tokio::test]
async fn repeated_sizing_error_becomes_fatal() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    // bypasses validation to force the sizer into an invalid bound
    let cfg = AgentConfig {
        sizing_policy: SizingPolicy::ImpactBound,
        max_price_impact_percent: BigDecimal::from(0),
        ..config()
    };

    let first = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(first, AppError::Sizing(_)));
    assert!(!first.is_fatal());

    let second = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(second, AppError::FatalSizing { cycles: 2, .. }));
    assert!(second.is_fatal());
}

#[tokio::test]
async fn sizing_errors_separated_by_a_noop_are_not_consecutive() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        sizing_policy: SizingPolicy::ImpactBound,
        max_price_impact_percent: BigDecimal::from(0),
        ..config()
    };

    let first = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(first, AppError::Sizing(_)));
    assert_eq!(state.sizing_failures(), 1);

    // back at parity the cycle ends before sizing
    pool.with(|i| {
        i.snapshot = ReserveSnapshot::new(U256::from(SKEWED_B), U256::from(SKEWED_B), 0)
    });
    let outcome = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Noop(NoopReason::ThresholdNotReached));
    assert_eq!(state.sizing_failures(), 0);

    pool.with(|i| {
        i.snapshot = ReserveSnapshot::new(U256::from(SKEWED_A), U256::from(SKEWED_B), 0)
    });
    let third = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(third, AppError::Sizing(_)));
    assert!(!third.is_fatal());
}

#[tokio::test]
async fn non_sizing_error_breaks_the_sizing_streak() {
    let pool = MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000);
    let mut state = AgentState::new();
    let cfg = AgentConfig {
        sizing_policy: SizingPolicy::ImpactBound,
        max_price_impact_percent: BigDecimal::from(0),
        ..config()
    };

    evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    pool.with(|i| i.quote_skew = U256::one());
    let mismatch = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(mismatch, AppError::QuoteMismatch { .. }));
    assert_eq!(state.sizing_failures(), 0);

    pool.with(|i| i.quote_skew = U256::zero());
    let again = evaluate_and_act(&mut state, &pool, &cfg).await.unwrap_err();
    assert!(matches!(again, AppError::Sizing(_)));
}

#[tokio::test]
async fn burst_of_events_trades_once() {
    let pool = Arc::new(MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000));
    let (agent, worker) = Agent::spawn(pool.clone(), config());

    agent.trigger(Trigger::Startup).unwrap();
    for _ in 0..5 {
        agent.trigger(Trigger::Pool(PoolEvent::LiquidityAdded)).unwrap();
    }
    drop(agent);
    worker.await.unwrap().unwrap();

    let swaps = pool.swaps();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].direction(), SwapDirection::BToA);
}

#[tokio::test]
async fn failing_cycle_does_not_stop_the_queue() {
    let pool = Arc::new(MockPool::new(SKEWED_A, SKEWED_B, 0, 1_000_000_000));
    pool.with(|i| i.failing_swaps = 1);
    let (agent, worker) = Agent::spawn(pool.clone(), config());

    agent.trigger(Trigger::Pool(PoolEvent::LiquidityRemoved)).unwrap();
    agent
        .trigger(Trigger::Pool(PoolEvent::SwapOccurred {
            initiator: ethers::types::Address::repeat_byte(0x42),
        }))
        .unwrap();
    drop(agent);
    worker.await.unwrap().unwrap();

    assert_eq!(pool.swaps().len(), 1);
}
