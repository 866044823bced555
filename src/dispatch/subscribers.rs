use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio::sync::mpsc;

use crate::model::LiveEvent;

/// Events a subscriber may fall behind by before it is dropped.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// A registered live subscriber; dropping the receiver ends the subscription
/// on the next broadcast.
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// Set of currently connected live subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    senders: Mutex<HashMap<u64, mpsc::Sender<LiveEvent>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.lock().insert(id, tx);
        debug!("Live subscriber {id} connected");
        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!("Live subscriber {id} disconnected");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `event` to every subscriber and prunes those that cannot take it.
    ///
    /// Sends happen on a snapshot, so subscribers may join or leave while a
    /// broadcast is in flight.
    pub fn broadcast(&self, event: &LiveEvent) {
        let snapshot: Vec<(u64, mpsc::Sender<LiveEvent>)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let failed: Vec<u64> = snapshot
            .into_iter()
            .filter_map(|(id, tx)| tx.try_send(event.clone()).err().map(|_| id))
            .collect();

        if failed.is_empty() {
            return;
        }

        let mut senders = self.lock();
        for id in failed {
            debug!("Pruning live subscriber {id}");
            senders.remove(&id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<LiveEvent>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Provider, Status, Transition};

    fn event(id: &str) -> LiveEvent {
        LiveEvent::BuildUpdated {
            build: Transition {
                provider: Provider::Github,
                pipeline_name: "acme/api".into(),
                external_id: id.into(),
                status_old: None,
                status_new: Status::Running,
                web_url: None,
                duration_seconds: None,
                started_at: None,
            },
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_events_in_order() {
        let registry = SubscriberRegistry::new();
        let mut a = registry.subscribe();
        let mut b = registry.subscribe();

        registry.broadcast(&event("1"));
        registry.broadcast(&event("2"));

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.events.recv().await, Some(event("1")));
            assert_eq!(sub.events.recv().await, Some(event("2")));
        }
    }

    #[test]
    fn closed_subscriber_is_pruned_on_next_broadcast() {
        let registry = SubscriberRegistry::new();
        let kept = registry.subscribe();
        let gone = registry.subscribe();
        drop(gone);

        registry.broadcast(&event("1"));

        assert_eq!(registry.len(), 1);
        drop(kept);
    }

    #[test]
    fn subscriber_that_falls_behind_is_pruned() {
        let registry = SubscriberRegistry::new();
        let _stalled = registry.subscribe();

        for i in 0..=SUBSCRIBER_BUFFER {
            registry.broadcast(&event(&i.to_string()));
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let registry = SubscriberRegistry::new();
        let first = registry.subscribe();
        let _second = registry.subscribe();

        registry.unsubscribe(first.id);
        registry.unsubscribe(first.id);

        assert_eq!(registry.len(), 1);
    }
}
