//! SMTP delivery for AgendaWorks digest emails.
//!
//! Thin [`NotificationTransport`] implementation over lettre. Delivery
//! failures are reported as outcomes, never as panics; the engine
//! records them in the escalation log and moves on.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use agendaworks_core::config::MailConfig;
use agendaworks_core::error::{AgendaError, Result};
use agendaworks_core::notify::{NotificationTransport, SendOutcome};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP-backed notification transport.
pub struct MailTransport {
    config: MailConfig,
}

impl MailTransport {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_server)
        }
        .map_err(|e| AgendaError::Mail(format!("SMTP relay setup failed: {e}")))?;

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }

    fn build_message(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<Message> {
        let mut builder = Message::builder()
            .from(
                self.config
                    .sender
                    .parse()
                    .map_err(|e| AgendaError::Mail(format!("bad sender address: {e}")))?,
            )
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|e| AgendaError::Mail(format!("bad recipient {recipient}: {e}")))?);
        }
        builder
            .body(html_body.to_string())
            .map_err(|e| AgendaError::Mail(format!("message build failed: {e}")))
    }

    /// Verify SMTP connectivity and credentials without sending.
    pub async fn test_connection(&self) -> Result<()> {
        let mailer = self.mailer()?;
        let ok = mailer
            .test_connection()
            .await
            .map_err(|e| AgendaError::Mail(format!("SMTP connection failed: {e}")))?;
        if ok {
            Ok(())
        } else {
            Err(AgendaError::Mail("SMTP server rejected the connection".into()))
        }
    }

    async fn deliver(&self, recipients: &[String], subject: &str, html_body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(AgendaError::Mail("no recipients configured".into()));
        }
        let message = self.build_message(recipients, subject, html_body)?;
        let mailer = self.mailer()?;
        mailer
            .send(message)
            .await
            .map_err(|e| AgendaError::Mail(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationTransport for MailTransport {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn send(&self, recipients: &[String], subject: &str, html_body: &str) -> SendOutcome {
        match self.deliver(recipients, subject, html_body).await {
            Ok(()) => {
                tracing::info!("📧 Email sent to {} recipient(s)", recipients.len());
                SendOutcome::success()
            }
            Err(e) => {
                tracing::warn!("⚠️ Email delivery failed: {e}");
                SendOutcome::failure(e.to_string())
            }
        }
    }
}
