//! AgendaWorks configuration system.
//!
//! TOML file at `~/.agendaworks/config.toml`. Every field has a serde
//! default so a partial (or missing) file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgendaError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaConfig {
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl AgendaConfig {
    /// Load config from the default path (~/.agendaworks/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgendaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AgendaError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AgendaError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the AgendaWorks home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agendaworks")
    }
}

/// SMTP mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// From address on outgoing alerts.
    #[serde(default)]
    pub sender: String,
    /// Alert recipients. When empty, alerts go to the sender.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// STARTTLS on a plain connection; false means implicit TLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_true() -> bool {
    true
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            recipients: Vec::new(),
            starttls: true,
        }
    }
}

impl MailConfig {
    /// Whether enough is configured to attempt a send.
    pub fn is_configured(&self) -> bool {
        !self.smtp_server.is_empty()
            && !self.username.is_empty()
            && !self.password.is_empty()
            && !self.sender.is_empty()
    }

    /// Effective recipient list (sender when none configured).
    pub fn effective_recipients(&self) -> Vec<String> {
        if self.recipients.is_empty() {
            vec![self.sender.clone()]
        } else {
            self.recipients.clone()
        }
    }
}

/// Background sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// How often the sweeper wakes up to check for day rollover.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Attempts per mutating store call in the background path.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Delay between contention retries.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_poll_interval() -> u64 {
    3600
}
fn default_retry_attempts() -> u32 {
    5
}
fn default_retry_backoff() -> u64 {
    250
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgendaConfig::default();
        assert_eq!(config.mail.smtp_port, 587);
        assert!(config.mail.starttls);
        assert_eq!(config.sweep.poll_interval_secs, 3600);
        assert!(!config.mail.is_configured());
    }

    #[test]
    fn test_partial_toml() {
        let config: AgendaConfig = toml::from_str(
            "[mail]\nusername = \"ops@example.com\"\npassword = \"secret\"\nsender = \"ops@example.com\"\n",
        )
        .unwrap();
        assert!(config.mail.is_configured());
        assert_eq!(config.mail.smtp_server, "smtp.gmail.com");
        assert_eq!(config.mail.effective_recipients(), vec!["ops@example.com"]);
    }

    #[test]
    fn test_explicit_recipients() {
        let mut mail = MailConfig::default();
        mail.recipients = vec!["a@x.com".into(), "b@x.com".into()];
        assert_eq!(mail.effective_recipients().len(), 2);
    }
}
