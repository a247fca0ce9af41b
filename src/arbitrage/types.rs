use crate::models::{SwapDirection, SwapPlan, TxConfirmation};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What to do when the requested amount exceeds the sizer's bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactPolicy {
    #[default]
    Clamp,
    Reject,
}

impl FromStr for ImpactPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(ImpactPolicy::Clamp),
            "reject" => Ok(ImpactPolicy::Reject),
            other => Err(format!("unknown impact policy `{other}`")),
        }
    }
}

/// Why a cycle ended without trading. These are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopReason {
    EmptyPool,
    ThresholdNotReached,
    DirectionSuppressed,
    ExceedsImpactBound,
    InsufficientBalance,
    ZeroAmount,
}

impl fmt::Display for NoopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoopReason::EmptyPool => "pool has an empty reserve",
            NoopReason::ThresholdNotReached => "swap threshold was not reached",
            NoopReason::DirectionSuppressed => "last swap went the same direction",
            NoopReason::ExceedsImpactBound => "amount would move the price too much",
            NoopReason::InsufficientBalance => "insufficient balance",
            NoopReason::ZeroAmount => "sized amount is zero",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Noop(NoopReason),
    Swapped {
        plan: SwapPlan,
        confirmation: TxConfirmation,
    },
}

impl CycleOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, CycleOutcome::Noop(_))
    }

    pub fn noop_reason(&self) -> Option<NoopReason> {
        match self {
            CycleOutcome::Noop(reason) => Some(*reason),
            CycleOutcome::Swapped { .. } => None,
        }
    }
}

/// Audit record of one decision cycle, logged as JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub reserve_a: Option<String>,
    pub reserve_b: Option<String>,
    pub price_a: Option<String>,
    pub price_b: Option<String>,
    pub direction: SwapDirection,
    pub requested: Option<String>,
    pub max_amount: Option<String>,
    pub amount_in: Option<String>,
    pub reason: Option<NoopReason>,
    pub tx_hash: Option<String>,
}

impl CycleReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
