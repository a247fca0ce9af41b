//! Pool event source.
//!
//! Subscribes to the pair's `Mint`, `Burn` and `Swap` logs over WebSocket and
//! hands each relevant event to a callback. Swaps paid out to the agent's own
//! wallet are dropped here so the agent never re-triggers on its own trade.

use crate::dex::client::{UniswapV2Pair, UniswapV2PairEvents};
use crate::errors::{AppError, Result};
use crate::models::PoolEvent;
use ethers::providers::{Provider, Ws};
use ethers::types::Address;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Drops swaps initiated by the agent itself.
#[derive(Debug, Clone, Copy)]
pub struct SelfSwapFilter {
    own_wallet: Address,
}

impl SelfSwapFilter {
    pub fn new(own_wallet: Address) -> Self {
        Self { own_wallet }
    }

    pub fn should_trigger(&self, event: &PoolEvent) -> bool {
        match event {
            PoolEvent::SwapOccurred { initiator } => *initiator != self.own_wallet,
            PoolEvent::LiquidityAdded | PoolEvent::LiquidityRemoved => true,
        }
    }
}

impl From<UniswapV2PairEvents> for PoolEvent {
    fn from(event: UniswapV2PairEvents) -> Self {
        match event {
            UniswapV2PairEvents::MintFilter(_) => PoolEvent::LiquidityAdded,
            UniswapV2PairEvents::BurnFilter(_) => PoolEvent::LiquidityRemoved,
            // the router pays output to `to`, which is the agent wallet for its own swaps
            UniswapV2PairEvents::SwapFilter(swap) => PoolEvent::SwapOccurred {
                initiator: swap.to,
            },
        }
    }
}

/// Streams filtered pool events into `on_event` until it returns `false`.
/// Reconnects with exponential backoff when the subscription drops.
pub async fn listen_pool_events<F>(
    ws_url: &Url,
    pair_address: Address,
    filter: SelfSwapFilter,
    mut on_event: F,
) -> Result<()>
where
    F: FnMut(PoolEvent) -> bool + Send,
{
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match subscribe_once(ws_url, pair_address, filter, &mut on_event, &mut backoff).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "[EVENT] subscription lost");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn subscribe_once<F>(
    ws_url: &Url,
    pair_address: Address,
    filter: SelfSwapFilter,
    on_event: &mut F,
    backoff: &mut Duration,
) -> Result<()>
where
    F: FnMut(PoolEvent) -> bool + Send,
{
    let provider = Provider::<Ws>::connect(ws_url.as_str())
        .await
        .map_err(|e| AppError::EventStream(format!("connect failed: {e}")))?;
    let pair = UniswapV2Pair::new(pair_address, Arc::new(provider));
    let events = pair.events();
    let mut stream = events
        .subscribe()
        .await
        .map_err(|e| AppError::EventStream(format!("subscribe failed: {e}")))?;
    info!(?pair_address, "[EVENT] listening for pool events");
    *backoff = INITIAL_BACKOFF;

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(raw) => PoolEvent::from(raw),
            Err(e) => {
                warn!(error = %e, "[EVENT] undecodable pool log");
                continue;
            }
        };
        if !filter.should_trigger(&event) {
            debug!(%event, "[EVENT] ignoring own swap");
            continue;
        }
        info!(%event, "[EVENT] pool changed");
        if !on_event(event) {
            return Ok(());
        }
    }
    Err(AppError::EventStream("subscription stream ended".into()))
}
