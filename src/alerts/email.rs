use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::debug;

use crate::config::EmailConfig;
use crate::error::{CiPulseError, Result};
use crate::model::Transition;

use super::{format_duration, AlertChannel};

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

/// Sends one plain-text mail per transition over STARTTLS SMTP.
pub struct EmailChannel {
    mailer: Option<Mailer>,
}

impl EmailChannel {
    /// The channel is inert unless host, credentials, sender and recipients
    /// are all present.
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse or the relay cannot be
    /// set up.
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        let (Some(host), Some(user), Some(password), Some(from), Some(to)) = (
            present(&config.smtp_host),
            present(&config.username),
            present(&config.password),
            present(&config.from),
            present(&config.to),
        ) else {
            return Ok(Self { mailer: None });
        };

        let from = from
            .parse::<Mailbox>()
            .map_err(|e| CiPulseError::Config(format!("invalid email sender '{from}': {e}")))?;
        let to = to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                addr.parse::<Mailbox>().map_err(|e| {
                    CiPulseError::Config(format!("invalid email recipient '{addr}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| CiPulseError::Config(format!("invalid SMTP relay '{host}': {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();

        Ok(Self {
            mailer: Some(Mailer {
                transport,
                from,
                to,
            }),
        })
    }
}

fn subject(transition: &Transition) -> String {
    format!(
        "[CI/CD] {} {} -> {}",
        transition.provider, transition.pipeline_name, transition.status_new
    )
}

fn body(transition: &Transition) -> String {
    let old = transition
        .status_old
        .as_ref()
        .map_or("new", |status| status.as_str());
    format!(
        "Pipeline: {}\nProvider: {}\nStatus: {} -> {}\nURL: {}\nDuration: {}\n",
        transition.pipeline_name,
        transition.provider,
        old,
        transition.status_new,
        transition.web_url.as_deref().unwrap_or("-"),
        format_duration(transition.duration_seconds),
    )
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn is_configured(&self) -> bool {
        self.mailer.is_some()
    }

    async fn notify(&self, transition: &Transition) -> Result<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };

        let mut builder = Message::builder()
            .from(mailer.from.clone())
            .subject(subject(transition))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &mailer.to {
            builder = builder.to(recipient.clone());
        }
        let message = builder
            .body(body(transition))
            .map_err(|e| CiPulseError::Alert(format!("could not build email: {e}")))?;

        mailer
            .transport
            .send(message)
            .await
            .map_err(|e| CiPulseError::Alert(format!("SMTP delivery failed: {e}")))?;

        debug!("Email sent: {}", subject(transition));
        Ok(())
    }
}
