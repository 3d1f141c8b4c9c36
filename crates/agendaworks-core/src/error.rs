//! Error taxonomy shared across AgendaWorks crates.

use thiserror::Error;

/// All errors the engine and its collaborators can surface.
#[derive(Debug, Error)]
pub enum AgendaError {
    /// Configuration could not be read, parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// Persistent store failure other than contention.
    #[error("store error: {0}")]
    Store(String),

    /// The store rejected a writer under contention. Background callers
    /// retry this with bounded backoff; the synchronous UI path surfaces
    /// it so a human can retry.
    #[error("store busy, retry later")]
    Busy,

    /// A date string did not parse as a calendar date.
    #[error("invalid date '{value}' for {field}")]
    Date { field: String, value: String },

    /// Caller-supplied input rejected before touching the store.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Mail transport failure. The escalation sweep never propagates
    /// these; they end up recorded per instance in the escalation log.
    #[error("mail error: {0}")]
    Mail(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgendaError {
    /// Whether this error is transient store contention worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(self, AgendaError::Busy)
    }
}

pub type Result<T> = std::result::Result<T, AgendaError>;
