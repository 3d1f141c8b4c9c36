//! AgendaWorks scheduling and escalation engine.
//!
//! Tracks construction-contract projects against a fixed checklist of
//! template tasks, computes deadlines from project anchor dates,
//! propagates prerequisite completions, stamps monthly recurring
//! instances, and escalates overdue work through tiered email digests.
//!
//! ```text
//!  ┌────────────┐   create/update    ┌──────────────┐
//!  │   Engine    ├──────────────────▶│   AgendaDb    │ SQLite (WAL)
//!  └─────┬──────┘                    └──────┬───────┘
//!        │ run_sweep (daily)                │
//!        ▼                                  ▼
//!  classify ─▶ per-project digest ─▶ NotificationTransport
//! ```
//!
//! Everything date-shaped is a calendar date; the engine never reasons
//! about times of day beyond the once-per-day sweep marker.

pub mod anchor;
pub mod catalog;
pub mod digest;
pub mod engine;
pub mod escalate;
pub mod materialize;
pub mod persistence;
pub mod propagate;
pub mod recalc;
pub mod recurring;
pub mod retry;
pub mod sweep;
pub mod tasks;

pub use engine::{Engine, SweepOutcome};
pub use escalate::{DueTask, Tier, classify};
pub use persistence::AgendaDb;
pub use retry::with_retry;
pub use sweep::{SweeperHandle, spawn_sweeper};
pub use tasks::{
    AlertStatus, AnchorField, CriticalDate, DeadlineBasis, EscalationClass, EscalationRecord,
    Project, ProjectDraft, ProjectStatus, Recurrence, TaskInstance, TaskTemplate,
};
