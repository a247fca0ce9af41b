//! Miscellaneous helper utilities.

use ethers::types::U256;
use ethers::utils::format_units;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Human-readable token amount for logs. Falls back to raw units.
pub fn display_amount(amount: U256, decimals: u32) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// Unix timestamp `secs` from now, as a swap deadline.
pub fn deadline_from_now(secs: u64) -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    U256::from(now.as_secs().saturating_add(secs))
}
