//! Outgoing mail
//!
//! Account emails (verification, password reset) go through the [`Mailer`]
//! trait. Without a relay configured, [`LogMailer`] writes the message to the
//! log so links can be copied during development.

mod http;

pub use http::{HttpMailer, MailRelayConfig};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay rejected message: {0}")]
    Rejected(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mailer configuration error: {0}")]
    Config(String),

    #[error("Mail delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// A message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl OutgoingMail {
    pub fn email_verification(to: &str, name: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your SEAMS account".to_string(),
            text: format!(
                "Hi {},\n\nPlease confirm your email address to activate your SEAMS account:\n\n{}\n\nThis link expires in 24 hours.\n",
                name, link
            ),
        }
    }

    pub fn password_reset(to: &str, name: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your SEAMS password".to_string(),
            text: format!(
                "Hi {},\n\nA password reset was requested for your account. Use this link to choose a new password:\n\n{}\n\nThis link expires in 10 minutes. If you did not request it, ignore this email.\n",
                name, link
            ),
        }
    }
}

/// Delivers outgoing mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Development mailer: logs the message instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.text,
            "Mail relay not configured, logging message instead of sending"
        );
        Ok(())
    }
}

/// Send `mail` on its own task, giving up after `budget`.
///
/// When delivery fails, `undo` runs on the same task, so it still completes
/// if the request that asked for the mail has been abandoned.
pub async fn deliver_or_undo<F, Fut>(
    mailer: Arc<dyn Mailer>,
    mail: OutgoingMail,
    budget: Duration,
    undo: F,
) -> Result<(), MailError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let to = mail.to.clone();
        let result = match tokio::time::timeout(budget, mailer.send(mail)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(budget)),
        };
        if let Err(e) = &result {
            tracing::error!(to = %to, error = %e, "Mail delivery failed");
            undo().await;
        }
        result
    })
    .await
    .map_err(|e| MailError::Transport(format!("delivery task failed: {e}")))?
}

/// Build the mailer selected by configuration
pub fn from_config(config: &Config) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.mail_relay_url {
        Some(url) => {
            tracing::info!(relay = %url, "Using HTTP mail relay");
            let mailer = HttpMailer::new(MailRelayConfig {
                url: url.clone(),
                token: config.mail_relay_token.clone(),
                from: config.mail_from.clone(),
                timeout: config.mail_timeout().min(MailRelayConfig::default().timeout),
                max_elapsed_time: Some(config.mail_timeout()),
                ..MailRelayConfig::default()
            })?;
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("MAIL_RELAY_URL not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_contain_link() {
        let mail = OutgoingMail::email_verification("a@x.edu", "Asha", "http://app/verify-email/t");
        assert_eq!(mail.to, "a@x.edu");
        assert!(mail.text.contains("http://app/verify-email/t"));

        let mail = OutgoingMail::password_reset("a@x.edu", "Asha", "http://app/reset-password/t");
        assert!(mail.text.contains("http://app/reset-password/t"));
        assert!(mail.subject.contains("password"));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mail = OutgoingMail::email_verification("a@x.edu", "Asha", "link");
        assert!(LogMailer.send(mail).await.is_ok());
    }

    struct StalledMailer;

    #[async_trait]
    impl Mailer for StalledMailer {
        async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deliver_times_out_and_undoes() {
        let undone = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = undone.clone();
        let mail = OutgoingMail::email_verification("a@x.edu", "Asha", "link");

        let result = deliver_or_undo(
            Arc::new(StalledMailer),
            mail,
            Duration::from_millis(50),
            move || async move { flag.store(true, std::sync::atomic::Ordering::SeqCst) },
        )
        .await;

        assert!(matches!(result, Err(MailError::Timeout(_))));
        assert!(undone.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deliver_success_skips_undo() {
        let undone = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = undone.clone();
        let mail = OutgoingMail::password_reset("a@x.edu", "Asha", "link");
        let result = deliver_or_undo(
            Arc::new(LogMailer),
            mail,
            Duration::from_secs(1),
            move || async move { flag.store(true, std::sync::atomic::Ordering::SeqCst) },
        )
        .await;
        assert!(result.is_ok());
        assert!(!undone.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_from_config_defaults_to_log() {
        assert!(from_config(&Config::default()).is_ok());
    }
}
