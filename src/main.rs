use anyhow::{Context, Result};
use stablepair_arb::{
    agent::{Agent, Trigger},
    config::AppConfig,
    dex::PairClient,
    events::{SelfSwapFilter, listen_pool_events},
    utils,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    // Configuration errors are fatal before any cycle runs
    let config = AppConfig::from_env().context("invalid configuration")?;
    let agent_cfg = &config.agent;
    tracing::info!(
        threshold = %agent_cfg.threshold_ratio,
        max_impact_pct = %agent_cfg.max_price_impact_percent,
        sizing = %agent_cfg.sizing_policy,
        impact_policy = ?agent_cfg.impact_policy,
        fixed_amount = ?agent_cfg.fixed_amount,
        gas_multiplier = config.chain.gas_multiplier,
        "[INIT] stablepair-arb starting"
    );

    let client = Arc::new(PairClient::new(&config.chain).await?);
    let wallet = client.wallet_address();
    tracing::info!(?wallet, pair = ?config.chain.pair_address, "[INIT] connected to pool");

    let (agent, mut worker) = Agent::spawn(client, config.agent.clone());

    // An already diverged pool is corrected without waiting for an event
    agent.trigger(Trigger::Startup)?;

    let listener = {
        let agent = agent.clone();
        listen_pool_events(
            &config.chain.ws_url,
            config.chain.pair_address,
            SelfSwapFilter::new(wallet),
            move |event| agent.trigger(Trigger::Pool(event)).is_ok(),
        )
    };

    let interrupted = tokio::select! {
        res = listener => {
            res.context("event listener stopped")?;
            tracing::warn!("[INIT] event listener stopped, draining queue");
            false
        }
        res = &mut worker => {
            // the consumer only stops on its own after a fatal error
            return match res.context("queue consumer crashed")? {
                Ok(()) => Ok(()),
                Err(e) => Err(e).context("agent stopped on a fatal error"),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[INIT] shutdown requested, finishing the cycle in flight");
            true
        }
    };

    if interrupted {
        agent.shutdown();
    }
    tracing::info!(last_direction = %agent.last_direction().await, "[INIT] stopping agent");
    drop(agent);
    worker
        .await
        .context("queue consumer crashed")?
        .context("agent stopped on a fatal error")?;
    Ok(())
}
