pub mod evaluator;
pub mod guard;
pub mod orchestrator;
pub mod sizer;
pub mod types;

pub use evaluator::{select_direction, threshold_reached};
pub use guard::DirectionGuard;
pub use orchestrator::{AgentState, evaluate_and_act};
pub use sizer::{SizingPolicy, TradeSizer, max_trade_for_impact, profit_maximizing_amount};
pub use types::{CycleOutcome, CycleReport, ImpactPolicy, NoopReason};
