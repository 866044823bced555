//! Outbound notifications for build transitions.

mod email;
mod slack;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AlertsConfig;
use crate::error::Result;
use crate::model::Transition;

pub use email::EmailChannel;
pub use slack::SlackChannel;

/// A destination that is told about every transition.
///
/// An unconfigured channel returns `Ok(())` without doing anything.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the channel has enough settings to deliver anything.
    fn is_configured(&self) -> bool {
        true
    }

    async fn notify(&self, transition: &Transition) -> Result<()>;
}

/// Builds the Slack and email channels.
///
/// # Errors
///
/// Returns an error if a configured channel has invalid settings (for example
/// an unparseable sender address).
pub fn channels_from_config(
    config: &AlertsConfig,
    timeout: Duration,
) -> Result<Vec<Arc<dyn AlertChannel>>> {
    Ok(vec![
        Arc::new(SlackChannel::from_config(&config.slack, timeout)?) as Arc<dyn AlertChannel>,
        Arc::new(EmailChannel::from_config(&config.email)?),
    ])
}

/// Renders a duration for humans, `"-"` when unknown.
pub(crate) fn format_duration(seconds: Option<i64>) -> String {
    match seconds {
        Some(s) if s >= 60 => format!("{}m {}s", s / 60, s % 60),
        Some(s) => format!("{s}s"),
        None => "-".to_string(),
    }
}
