//! Fans transitions out to live subscribers and alert channels.

mod subscribers;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{info, warn};
use tokio::task::JoinHandle;

use crate::alerts::AlertChannel;
use crate::model::{LiveEvent, Transition};

pub use subscribers::{SubscriberRegistry, Subscription, SUBSCRIBER_BUFFER};

#[derive(Clone)]
pub struct Dispatcher {
    subscribers: Arc<SubscriberRegistry>,
    channels: Arc<[Arc<dyn AlertChannel>]>,
    alert_timeout: Duration,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>, alert_timeout: Duration) -> Self {
        for channel in channels.iter().filter(|c| !c.is_configured()) {
            info!("{} alerts not configured", channel.name());
        }
        Self {
            subscribers: Arc::new(SubscriberRegistry::new()),
            channels: channels.into(),
            alert_timeout,
        }
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Broadcasts each transition in order, then hands alerting to a
    /// background task.
    ///
    /// Never fails. The returned handle completes once every channel has been
    /// tried for every transition.
    pub fn dispatch(&self, transitions: &[Transition]) -> JoinHandle<()> {
        for transition in transitions {
            info!("{}", transition.summary());
            self.subscribers.broadcast(&LiveEvent::BuildUpdated {
                build: transition.clone(),
            });
        }

        let channels = Arc::clone(&self.channels);
        let timeout = self.alert_timeout;
        let transitions = transitions.to_vec();
        tokio::spawn(async move {
            for transition in &transitions {
                deliver_alerts(&channels, transition, timeout).await;
            }
        })
    }
}

/// Notifies every channel concurrently; failures are logged and dropped.
async fn deliver_alerts(channels: &[Arc<dyn AlertChannel>], transition: &Transition, timeout: Duration) {
    join_all(channels.iter().map(|channel| async move {
        match tokio::time::timeout(timeout, channel.notify(transition)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{} alert failed for {}: {e}", channel.name(), transition.summary()),
            Err(_) => warn!(
                "{} alert timed out after {:?} for {}",
                channel.name(),
                timeout,
                transition.summary()
            ),
        }
    }))
    .await;
}
