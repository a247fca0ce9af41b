//! Single-flight task queue.
//!
//! Tasks run strictly one after another on a single consumer task, in the
//! order they were enqueued. A failed or panicking task is logged and the
//! next one still runs; only a fatal error or a shutdown request stops the
//! consumer.

use crate::errors::{AppError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type Task = BoxFuture<'static, Result<()>>;

/// Cloneable handle for enqueuing work. The consumer exits once every handle
/// is dropped and the backlog has drained, or as soon as the task in flight
/// settles after [`SingleFlightQueue::shutdown`].
#[derive(Clone)]
pub struct SingleFlightQueue {
    tx: mpsc::UnboundedSender<Task>,
    stop: Arc<watch::Sender<bool>>,
}

impl SingleFlightQueue {
    /// Starts the consumer. The returned handle resolves with the fatal error
    /// that stopped it, or `Ok(())` after a clean exit.
    pub fn spawn() -> (Self, JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, _) = watch::channel(false);
        let stop = Arc::new(stop);
        let handle = tokio::spawn(run_consumer(rx, stop.clone()));
        (Self { tx, stop }, handle)
    }

    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tx
            .send(task.boxed())
            .map_err(|_| AppError::Other("queue consumer has stopped".into()))
    }

    /// Lets the task in flight finish and discards everything still queued.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
    }
}

async fn run_consumer(
    mut rx: mpsc::UnboundedReceiver<Task>,
    stop: Arc<watch::Sender<bool>>,
) -> Result<()> {
    // holding `stop` keeps the watch open for as long as the consumer runs
    let mut stop_rx = stop.subscribe();
    let mut seq: u64 = 0;
    loop {
        let task = tokio::select! {
            biased;
            _ = stop_rx.wait_for(|stopped| *stopped) => {
                rx.close();
                let mut discarded = 0usize;
                while rx.try_recv().is_ok() {
                    discarded += 1;
                }
                info!(seq, discarded, "[QUEUE] shutdown requested, backlog discarded");
                return Ok(());
            }
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        seq += 1;
        match AssertUnwindSafe(task).catch_unwind().await {
            Ok(Ok(())) => debug!(seq, "[QUEUE] task settled"),
            Ok(Err(e)) if e.is_fatal() => {
                error!(seq, kind = e.kind(), error = %e, "[QUEUE] fatal error, stopping");
                return Err(e);
            }
            Ok(Err(e)) => {
                warn!(seq, kind = e.kind(), error = %e, "[QUEUE] task failed, continuing");
            }
            Err(_) => error!(seq, "[QUEUE] task panicked, continuing"),
        }
    }
    debug!(seq, "[QUEUE] all handles dropped, consumer exiting");
    Ok(())
}
