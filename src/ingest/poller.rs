use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Ingestor;

/// Runs a poll pass on a fixed interval until shut down.
pub struct Poller;

impl Poller {
    /// Starts the loop; the first pass runs immediately.
    pub fn spawn(ingestor: Ingestor, interval: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Polling every {interval:?}");

            loop {
                tokio::select! {
                    _ = ticker.tick() => poll_pass(&ingestor).await,
                    _ = &mut shutdown_rx => break,
                }
            }
            info!("Poller stopped");
        });

        PollerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

impl Ingestor {
    /// Runs one poll pass on its own task, off the poller's schedule; errors
    /// are logged.
    pub fn spawn_pass(&self) -> JoinHandle<()> {
        let ingestor = self.clone();
        tokio::spawn(async move { poll_pass(&ingestor).await })
    }
}

async fn poll_pass(ingestor: &Ingestor) {
    match ingestor.run_once().await {
        Ok((transitions, _alerts)) => {
            debug!("Poll pass done, {} transitions", transitions.len());
        }
        Err(e) => error!("Poll pass failed: {e}"),
    }
}

/// Control handle for a running [`Poller`].
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the loop, letting an in-flight pass finish first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!("Poller task ended abnormally: {e}");
        }
    }
}
