//! The two producers of observations: the poll pass and inbound webhooks.

mod poller;

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::model::{IngestSource, Provider, Transition};
use crate::providers::AdapterRegistry;
use crate::store::BuildStore;

pub use poller::{Poller, PollerHandle};

/// Outcome of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub ok: bool,
    pub updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl WebhookOutcome {
    pub fn updated(updated: usize) -> Self {
        Self {
            ok: true,
            updated,
            reason: None,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            ok: false,
            updated: 0,
            reason: Some("unsupported_event"),
        }
    }
}

/// Ties adapters, the store and the dispatcher together.
#[derive(Clone)]
pub struct Ingestor {
    registry: AdapterRegistry,
    providers: Arc<[Provider]>,
    store: BuildStore,
    dispatcher: Dispatcher,
}

impl Ingestor {
    pub fn new(
        registry: AdapterRegistry,
        providers: Vec<Provider>,
        store: BuildStore,
        dispatcher: Dispatcher,
    ) -> Self {
        for adapter in registry.enabled(&providers) {
            if !adapter.is_configured() {
                info!(
                    "{} has no credentials or targets, accepting webhooks only",
                    adapter.provider()
                );
            }
        }
        Self {
            registry,
            providers: providers.into(),
            store,
            dispatcher,
        }
    }

    pub fn store(&self) -> &BuildStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// One poll pass over every enabled adapter.
    ///
    /// Adapter failures are contained inside the adapters; only a storage
    /// failure makes the pass fail, and then nothing is dispatched. Adapters
    /// without credentials or targets are skipped.
    pub async fn run_once(&self) -> Result<(Vec<Transition>, JoinHandle<()>)> {
        let adapters: Vec<_> = self
            .registry
            .enabled(&self.providers)
            .into_iter()
            .filter(|a| a.is_configured())
            .collect();
        let observations: Vec<_> = join_all(adapters.iter().map(|a| a.fetch_recent()))
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!("Poll pass collected {} observations", observations.len());

        let transitions = self.store.reconcile(observations, IngestSource::Poll).await?;
        let alerts = self.dispatcher.dispatch(&transitions);
        Ok((transitions, alerts))
    }

    /// Normalizes and applies one webhook payload.
    ///
    /// Returns `None` for a provider that has no adapter registered.
    pub async fn ingest_webhook(
        &self,
        provider: Provider,
        payload: &Value,
    ) -> Result<Option<WebhookOutcome>> {
        let Some(adapter) = self.registry.get(provider) else {
            return Ok(None);
        };

        let Some(observation) = adapter.normalize_webhook(payload) else {
            debug!("Ignoring unsupported {provider} webhook");
            return Ok(Some(WebhookOutcome::unsupported()));
        };

        let transitions = self
            .store
            .reconcile(vec![observation], IngestSource::Webhook)
            .await?;
        if !transitions.is_empty() {
            info!("{provider} webhook produced {} transitions", transitions.len());
        }
        // Alert delivery continues in the background.
        drop(self.dispatcher.dispatch(&transitions));

        Ok(Some(WebhookOutcome::updated(transitions.len())))
    }
}
