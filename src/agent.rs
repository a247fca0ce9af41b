//! Agent runtime: owns the decision state and feeds cycles through the
//! single-flight queue.

use crate::arbitrage::orchestrator::{AgentState, evaluate_and_act};
use crate::config::AgentConfig;
use crate::dex::PoolGateway;
use crate::errors::Result;
use crate::models::{PoolEvent, SwapDirection};
use crate::queue::SingleFlightQueue;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Pool(PoolEvent),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Startup => write!(f, "startup check"),
            Trigger::Pool(event) => write!(f, "{event}"),
        }
    }
}

pub struct Agent<G: ?Sized> {
    pool: Arc<G>,
    config: Arc<AgentConfig>,
    state: Arc<Mutex<AgentState>>,
    queue: SingleFlightQueue,
}

impl<G: ?Sized> Clone for Agent<G> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<G> Agent<G>
where
    G: PoolGateway + ?Sized + 'static,
{
    /// Starts the queue consumer. The handle resolves when the consumer stops,
    /// with the fatal error if there was one.
    pub fn spawn(pool: Arc<G>, config: AgentConfig) -> (Self, JoinHandle<Result<()>>) {
        let (queue, handle) = SingleFlightQueue::spawn();
        let agent = Self {
            pool,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(AgentState::new())),
            queue,
        };
        (agent, handle)
    }

    /// Enqueues one decision cycle. The cycle reads whatever state the pool
    /// is in when it runs, not the state at trigger time.
    pub fn trigger(&self, cause: Trigger) -> Result<()> {
        let pool = self.pool.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        self.queue.enqueue(async move {
            info!(%cause, "[CYCLE] starting");
            let mut state = state.lock().await;
            evaluate_and_act(&mut state, pool.as_ref(), &config).await?;
            Ok(())
        })
    }

    /// Stops the agent once the cycle in flight settles; queued cycles are dropped.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    pub async fn last_direction(&self) -> SwapDirection {
        self.state.lock().await.guard.last_direction()
    }
}
