//! Notification transport seam.
//!
//! The escalation engine only knows this trait; the SMTP implementation
//! lives in `agendaworks-mail`, and tests plug in a recording mock.

use async_trait::async_trait;

/// Result of one delivery attempt. Deliberately not an `Err`: a failed
/// send is an outcome the sweep records per task, never a reason to
/// abort other projects' digests.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Outbound notification channel.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Whether the transport has enough configuration to attempt a send.
    fn is_configured(&self) -> bool;

    /// Deliver one HTML message to the given recipients.
    async fn send(&self, recipients: &[String], subject: &str, html_body: &str) -> SendOutcome;
}
