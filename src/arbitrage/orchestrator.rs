//! One decision cycle: read, price, decide, size, execute.
//!
//! `IDLE → THRESHOLD_CHECK → DIRECTION_SELECT → SIZING → BALANCE_CHECK →
//! EXECUTE → IDLE`, leaving early as a [`CycleOutcome::Noop`] at every check.

use crate::arbitrage::evaluator::{select_direction, threshold_reached};
use crate::arbitrage::guard::DirectionGuard;
use crate::arbitrage::sizer::TradeSizer;
use crate::arbitrage::types::{CycleOutcome, CycleReport, ImpactPolicy, NoopReason};
use crate::config::AgentConfig;
use crate::dex::calc::quote_pair;
use crate::dex::{PoolGateway, ReserveSnapshot};
use crate::errors::{AppError, Result};
use crate::models::{PriceQuote, SwapPlan, TokenId, TxConfirmation};
use crate::utils::{deadline_from_now, display_amount};
use tracing::{info, warn};

/// Consecutive cycles ending in a sizing error before the agent gives up.
/// Every `SizingError` variant counts; a cycle ending any other way resets
/// the streak.
pub const MAX_SIZING_FAILURES: u32 = 2;

/// State carried between cycles. Only mutated from inside a queued task.
#[derive(Debug, Default)]
pub struct AgentState {
    pub guard: DirectionGuard,
    sizing_failures: u32,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sizing_failures(&self) -> u32 {
        self.sizing_failures
    }
}

/// Runs a full cycle against `pool` and logs its audit record.
///
/// A repeated sizing error is escalated to [`AppError::FatalSizing`].
pub async fn evaluate_and_act<G>(
    state: &mut AgentState,
    pool: &G,
    config: &AgentConfig,
) -> Result<CycleOutcome>
where
    G: PoolGateway + ?Sized,
{
    let mut report = CycleReport::default();
    let result = run_cycle(state, pool, config, &mut report).await;

    match &result {
        Ok(CycleOutcome::Noop(reason)) => {
            report.reason = Some(*reason);
            info!(%reason, report = %report.to_json(), "[CYCLE] no swap");
        }
        Ok(CycleOutcome::Swapped { plan, confirmation }) => {
            report.tx_hash = Some(format!("{:?}", confirmation.tx_hash));
            info!(
                direction = %plan.direction(),
                amount = %display_amount(plan.amount_in, config.token_decimals),
                report = %report.to_json(),
                "[CYCLE] swap finished"
            );
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, report = %report.to_json(), "[CYCLE] aborted");
        }
    }

    // any cycle that ends without a sizing error breaks the streak
    let sizing_error = match &result {
        Err(AppError::Sizing(source)) => Some(source.clone()),
        _ => None,
    };
    let Some(source) = sizing_error else {
        state.sizing_failures = 0;
        return result;
    };
    state.sizing_failures += 1;
    if state.sizing_failures >= MAX_SIZING_FAILURES {
        return Err(AppError::FatalSizing {
            cycles: state.sizing_failures,
            source,
        });
    }
    result
}

async fn run_cycle<G>(
    state: &mut AgentState,
    pool: &G,
    config: &AgentConfig,
    report: &mut CycleReport,
) -> Result<CycleOutcome>
where
    G: PoolGateway + ?Sized,
{
    log_wallet_balances(pool, config.token_decimals).await;

    // fresh reserves every cycle
    let snapshot = pool.get_reserves().await?;
    report.reserve_a = Some(snapshot.reserve_a.to_string());
    report.reserve_b = Some(snapshot.reserve_b.to_string());

    let Some((price_a, price_b)) = quote_pair(&snapshot, config.reference_amount, config.fee)
    else {
        return Ok(CycleOutcome::Noop(NoopReason::EmptyPool));
    };
    if config.verify_quotes {
        verify_quote(pool, &snapshot, &price_a).await?;
        verify_quote(pool, &snapshot, &price_b).await?;
    }
    report.price_a = Some(price_a.units_out.to_string());
    report.price_b = Some(price_b.units_out.to_string());
    info!(
        price_a = %display_amount(price_a.units_out, config.token_decimals),
        price_b = %display_amount(price_b.units_out, config.token_decimals),
        "[CYCLE] pool prices"
    );

    if !threshold_reached(price_a.units_out, price_b.units_out, &config.threshold_ratio) {
        return Ok(CycleOutcome::Noop(NoopReason::ThresholdNotReached));
    }

    let direction = select_direction(&price_a, &price_b, &config.threshold_ratio);
    report.direction = direction;
    let Some(sell_token) = direction.sell_token() else {
        return Ok(CycleOutcome::Noop(NoopReason::ThresholdNotReached));
    };
    info!(%direction, expensive = %sell_token, "[CYCLE] selling the expensive token");

    if state.guard.should_suppress(direction) {
        return Ok(CycleOutcome::Noop(NoopReason::DirectionSuppressed));
    }

    let balance = pool.balance_of(sell_token).await?;
    let requested = config.fixed_amount.unwrap_or(balance);
    report.requested = Some(requested.to_string());
    if balance.is_zero() || balance < requested {
        return Ok(CycleOutcome::Noop(NoopReason::InsufficientBalance));
    }

    let sizer = TradeSizer::new(
        config.sizing_policy,
        config.fee,
        config.max_price_impact_percent.clone(),
    );
    let max_amount = sizer.max_amount_in(&snapshot, sell_token)?;
    report.max_amount = Some(max_amount.to_string());

    let amount_in = if requested > max_amount {
        match config.impact_policy {
            ImpactPolicy::Clamp => {
                info!(
                    requested = %display_amount(requested, config.token_decimals),
                    max = %display_amount(max_amount, config.token_decimals),
                    policy = %config.sizing_policy,
                    "[CYCLE] clamping amount to the sizing bound"
                );
                max_amount
            }
            ImpactPolicy::Reject => {
                return Ok(CycleOutcome::Noop(NoopReason::ExceedsImpactBound));
            }
        }
    } else {
        requested
    };
    report.amount_in = Some(amount_in.to_string());
    if amount_in.is_zero() {
        return Ok(CycleOutcome::Noop(NoopReason::ZeroAmount));
    }

    let plan = SwapPlan::new(sell_token, amount_in);
    let confirmation = execute(pool, &plan, config).await.map_err(as_execution)?;
    state.guard.record_swap(plan.direction());
    log_wallet_balances(pool, config.token_decimals).await;

    Ok(CycleOutcome::Swapped { plan, confirmation })
}

/// Approve (when the allowance is short) and swap, both awaited to confirmation.
async fn execute<G>(
    pool: &G,
    plan: &SwapPlan,
    config: &AgentConfig,
) -> Result<TxConfirmation>
where
    G: PoolGateway + ?Sized,
{
    let allowance = pool.allowance(plan.sell_token).await?;
    if allowance < plan.amount_in {
        pool.approve(plan.sell_token, plan.amount_in).await?;
    }
    let deadline = deadline_from_now(config.deadline_secs);
    info!(
        direction = %plan.direction(),
        amount_in = %display_amount(plan.amount_in, config.token_decimals),
        min_out = %config.min_amount_out,
        "[EXEC] submitting swap"
    );
    pool.swap(plan, config.min_amount_out, deadline).await
}

fn as_execution(e: AppError) -> AppError {
    match e {
        AppError::Execution(_) => e,
        other => AppError::Execution(other.to_string()),
    }
}

/// The oracle and the router must agree to the unit.
async fn verify_quote<G>(pool: &G, snapshot: &ReserveSnapshot, quote: &PriceQuote) -> Result<()>
where
    G: PoolGateway + ?Sized,
{
    let (reserve_in, reserve_out) = snapshot.reserves_for_sale(quote.of_token);
    let remote = pool
        .get_amount_out(quote.units_in, reserve_in, reserve_out)
        .await?;
    if remote != quote.units_out {
        return Err(AppError::QuoteMismatch {
            token: quote.of_token.to_string(),
            local: quote.units_out.to_string(),
            remote: remote.to_string(),
        });
    }
    Ok(())
}

async fn log_wallet_balances<G>(pool: &G, decimals: u32)
where
    G: PoolGateway + ?Sized,
{
    match (
        pool.balance_of(TokenId::A).await,
        pool.balance_of(TokenId::B).await,
    ) {
        (Ok(a), Ok(b)) => info!(
            balance_a = %display_amount(a, decimals),
            balance_b = %display_amount(b, decimals),
            "[CYCLE] wallet balances"
        ),
        (Err(e), _) | (_, Err(e)) => warn!(error = %e, "[CYCLE] balance lookup failed"),
    }
}
