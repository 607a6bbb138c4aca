//! Mail delivery through an HTTP relay, with retry and backoff.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::{MailError, Mailer, OutgoingMail};

/// Configuration for the HTTP mail relay.
#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub url: String,
    /// Sent as a Bearer token when present
    pub token: Option<String>,
    pub from: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Total time allowed across retries; `timeout * max_retries` when unset.
    pub max_elapsed_time: Option<Duration>,
}

impl Default for MailRelayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            from: String::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: None,
        }
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends mail by POSTing JSON to a relay endpoint.
pub struct HttpMailer {
    client: Client,
    config: MailRelayConfig,
}

impl HttpMailer {
    pub fn new(config: MailRelayConfig) -> Result<Self, MailError> {
        url::Url::parse(&config.url)
            .map_err(|e| MailError::Config(format!("invalid relay URL: {e}")))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn send_once(
        &self,
        mail: &OutgoingMail,
    ) -> std::result::Result<(), backoff::Error<MailError>> {
        let start = Instant::now();

        let mut request = self.client.post(&self.config.url).json(&RelayMessage {
            from: &self.config.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
        });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient mail relay error, will retry");
                backoff::Error::transient(MailError::Transport(e.to_string()))
            } else {
                warn!(error = %e, latency_ms, "Permanent mail relay error, aborting");
                backoff::Error::permanent(MailError::Transport(e.to_string()))
            }
        })?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        if !status.is_success() {
            let err = MailError::Rejected(format!("relay returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, latency_ms, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        debug!(latency_ms, "Mail accepted by relay");
        Ok(())
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(
                self.config
                    .max_elapsed_time
                    .unwrap_or(self.config.timeout * self.config.max_retries),
            ),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        retry_notify(
            self.build_backoff(),
            || {
                let mail = &mail;
                async move { self.send_once(mail).await }
            },
            |err: MailError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Mail retry scheduled"
                );
            },
        )
        .await?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail sent");
        Ok(())
    }
}

/// Check if a reqwest error is transient and should be retried.
fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Check if an HTTP status code indicates a transient error.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
