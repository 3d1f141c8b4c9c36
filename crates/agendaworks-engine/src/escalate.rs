//! Escalation classifier: a pure function from one task instance and
//! today's date to the alert tier that fires, if any.
//!
//! Class A walks three reiterations at 2, 4 and 6 days overdue, gated
//! on the attempt counter, then goes critical-daily. Class B alerts on
//! the last day and goes critical-daily after. The measurement
//! confirmation subtype keys reiterations on the day of the month
//! instead of days overdue.

use chrono::{Datelike, NaiveDate};

use crate::tasks::{AlertStatus, EscalationClass, TaskInstance};

/// One firing alert tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Class A reiteration 1 to 3.
    Reiteration(u8),
    /// Class B deadline-day alert.
    LastDay,
    /// Daily alert for anything past its escalation ladder.
    CriticalDaily,
}

impl Tier {
    /// Stable kind string written to the escalation log.
    pub fn alert_kind(&self) -> &'static str {
        match self {
            Tier::Reiteration(1) => "reiteration-1",
            Tier::Reiteration(2) => "reiteration-2",
            Tier::Reiteration(_) => "reiteration-3",
            Tier::LastDay => "last-day",
            Tier::CriticalDaily => "critical-daily",
        }
    }

    /// Digest ordering: most severe first, so 0 is the most urgent.
    pub fn severity_rank(&self) -> u8 {
        match self {
            Tier::CriticalDaily => 0,
            Tier::LastDay => 1,
            Tier::Reiteration(n) => 2 + 3u8.saturating_sub(*n),
        }
    }

    /// Alert status the instance moves to once this tier fires.
    pub fn status(&self) -> AlertStatus {
        match self {
            Tier::Reiteration(_) => AlertStatus::Alerted,
            Tier::LastDay => AlertStatus::Critical,
            Tier::CriticalDaily => AlertStatus::Overdue,
        }
    }

    /// Human label for the digest table.
    pub fn label(&self) -> String {
        match self {
            Tier::Reiteration(n) => format!("Reiteration {n}"),
            Tier::LastDay => "LAST DAY".to_string(),
            Tier::CriticalDaily => "CRITICAL".to_string(),
        }
    }
}

/// A due instance joined with its project for digest assembly.
#[derive(Debug, Clone)]
pub struct DueTask {
    pub instance: TaskInstance,
    pub project_name: String,
    pub client: String,
}

/// Decide which tier fires for `instance` today, or None when nothing
/// should alert. Pure; the once-per-day guard and bookkeeping live in
/// the sweep.
pub fn classify(instance: &TaskInstance, today: NaiveDate) -> Option<Tier> {
    let overdue = instance.days_overdue(today)?;

    match instance.class {
        EscalationClass::A if instance.confirmation => {
            // Day-of-month ladder: 11th, 12th, then daily from the 13th.
            if overdue < 0 {
                return None;
            }
            match today.day() {
                11 if instance.attempts == 0 => Some(Tier::Reiteration(1)),
                12 if instance.attempts <= 1 => Some(Tier::Reiteration(2)),
                day if day >= 13 => Some(Tier::CriticalDaily),
                _ => None,
            }
        }
        EscalationClass::A => match (overdue, instance.attempts) {
            (2, 0) => Some(Tier::Reiteration(1)),
            (4, 1) => Some(Tier::Reiteration(2)),
            (6, 2) => Some(Tier::Reiteration(3)),
            (d, _) if d > 6 => Some(Tier::CriticalDaily),
            _ => None,
        },
        EscalationClass::B => match overdue {
            0 => Some(Tier::LastDay),
            d if d > 0 => Some(Tier::CriticalDaily),
            _ => None,
        },
    }
}

/// Attempt counter value after `tier` fires.
pub fn next_attempts(instance: &TaskInstance, tier: Tier) -> i64 {
    match tier {
        Tier::Reiteration(n) => n as i64,
        // Confirmation tasks jump straight past the ladder on the 13th.
        Tier::CriticalDaily if instance.confirmation => 3,
        _ => instance.attempts,
    }
}
