//! # AgendaWorks Core
//!
//! Shared foundation for the AgendaWorks contract-tracking engine:
//! configuration loading, the error taxonomy, and the notification
//! transport seam the scheduling engine emits digests through.
//!
//! Nothing in here touches SQLite or SMTP — those live in
//! `agendaworks-engine` and `agendaworks-mail` respectively.

pub mod config;
pub mod error;
pub mod notify;

pub use config::{AgendaConfig, MailConfig, SweepConfig};
pub use error::{AgendaError, Result};
pub use notify::{NotificationTransport, SendOutcome};
