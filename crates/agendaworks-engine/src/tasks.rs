//! Domain data model: projects, task templates, task instances.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which reference event a task's deadline is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadlineBasis {
    /// Project record creation.
    Creation,
    /// Project start date.
    Start,
    /// Contract signature date.
    Signature,
    /// Work authorization date.
    Authorization,
    /// Completion of a prerequisite task (resolved per instance,
    /// not a project-level anchor).
    PrerequisiteCompletion,
}

impl DeadlineBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineBasis::Creation => "creation",
            DeadlineBasis::Start => "start",
            DeadlineBasis::Signature => "signature",
            DeadlineBasis::Authorization => "authorization",
            DeadlineBasis::PrerequisiteCompletion => "prerequisite",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "creation" => DeadlineBasis::Creation,
            "signature" => DeadlineBasis::Signature,
            "authorization" => DeadlineBasis::Authorization,
            "prerequisite" => DeadlineBasis::PrerequisiteCompletion,
            _ => DeadlineBasis::Start,
        }
    }
}

/// A project date field that anchors deadlines and can be edited by the
/// CRUD layer after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorField {
    Start,
    Signature,
    Authorization,
}

impl AnchorField {
    pub fn basis(&self) -> DeadlineBasis {
        match self {
            AnchorField::Start => DeadlineBasis::Start,
            AnchorField::Signature => DeadlineBasis::Signature,
            AnchorField::Authorization => DeadlineBasis::Authorization,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorField::Start => "start_date",
            AnchorField::Signature => "signature_date",
            AnchorField::Authorization => "authorization_date",
        }
    }
}

/// Escalation class. A tasks get the reiterated multi-tier alert path;
/// B tasks get the fixed last-day/critical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationClass {
    A,
    B,
}

impl EscalationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationClass::A => "A",
            EscalationClass::B => "B",
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s == "B" {
            EscalationClass::B
        } else {
            EscalationClass::A
        }
    }
}

/// Recurrence mode of a template or instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recurrence {
    OneOff,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::OneOff => "one-off",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s == "monthly" {
            Recurrence::Monthly
        } else {
            Recurrence::OneOff
        }
    }
}

/// Alert bookkeeping status on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Pending,
    Alerted,
    Critical,
    Overdue,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Alerted => "alerted",
            AlertStatus::Critical => "critical",
            AlertStatus::Overdue => "overdue",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "alerted" => AlertStatus::Alerted,
            "critical" => AlertStatus::Critical,
            "overdue" => AlertStatus::Overdue,
            _ => AlertStatus::Pending,
        }
    }
}

/// Critical project date a task completion unlocks. The toggle operation
/// returns this so the UI can prompt for the date right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriticalDate {
    Signature,
    Authorization,
}

impl CriticalDate {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalDate::Signature => "signature",
            CriticalDate::Authorization => "authorization",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signature" => Some(CriticalDate::Signature),
            "authorization" => Some(CriticalDate::Authorization),
            _ => None,
        }
    }

    pub fn field(&self) -> AnchorField {
        match self {
            CriticalDate::Signature => AnchorField::Signature,
            CriticalDate::Authorization => AnchorField::Authorization,
        }
    }
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    NotStarted,
    InProgress,
    Late,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "Not Started",
            ProjectStatus::InProgress => "In Progress",
            ProjectStatus::Late => "Late",
            ProjectStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "In Progress" => ProjectStatus::InProgress,
            "Late" => ProjectStatus::Late,
            "Completed" => ProjectStatus::Completed,
            _ => ProjectStatus::NotStarted,
        }
    }
}

/// Immutable catalog row describing one checklist task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: i64,
    pub name: String,
    /// Dependency-resolution pass order.
    pub sequence: i64,
    /// Signed day offset from the anchor. Negative offsets are
    /// lead-time tasks due before the anchor.
    pub offset_days: i64,
    pub class: EscalationClass,
    pub basis: DeadlineBasis,
    /// Prerequisite template id; only meaningful when
    /// basis = PrerequisiteCompletion.
    pub prerequisite_id: Option<i64>,
    pub recurrence: Recurrence,
    /// Day-of-month deadline anchor for monthly templates.
    pub month_day: Option<u32>,
    /// Critical date completing this task unlocks.
    pub trigger: Option<CriticalDate>,
    /// Day-of-month keyed alert subtype (measurement confirmation).
    pub confirmation: bool,
}

/// A construction-contract project. Date fields are kept as the raw
/// TEXT the CRUD layer wrote; the anchor resolver parses them and
/// treats anything malformed as unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub client: String,
    pub contract_value: f64,
    pub start_date: Option<String>,
    pub status: ProjectStatus,
    /// `YYYY-MM-DD HH:MM:SS` local timestamp.
    pub created_at: String,
    pub contract_number: Option<String>,
    pub agency_prefix: Option<String>,
    pub service: Option<String>,
    pub partner_value: Option<f64>,
    pub percentage: Option<f64>,
    pub total_value: Option<f64>,
    pub execution_month: Option<String>,
    pub execution_year: Option<i64>,
    pub completion_date: Option<String>,
    pub signature_date: Option<String>,
    pub authorization_date: Option<String>,
}

/// Fields accepted when creating or updating a project.
#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub name: String,
    pub client: String,
    pub contract_value: f64,
    pub start_date: Option<String>,
    pub status: ProjectStatus,
    pub contract_number: Option<String>,
    pub agency_prefix: Option<String>,
    pub service: Option<String>,
    pub partner_value: Option<f64>,
    pub percentage: Option<f64>,
    pub total_value: Option<f64>,
    pub execution_month: Option<String>,
    pub execution_year: Option<i64>,
    pub completion_date: Option<String>,
    pub signature_date: Option<String>,
    pub authorization_date: Option<String>,
}

/// A concrete per-project unit of work.
///
/// Invariant: when basis = PrerequisiteCompletion, `deadline` is None
/// exactly while `blocked` is true; once unblocked the deadline is
/// always anchor + offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: i64,
    pub project_id: i64,
    pub template_id: i64,
    pub description: String,
    pub offset_days: i64,
    pub deadline: Option<NaiveDate>,
    pub completed: bool,
    pub completed_on: Option<NaiveDate>,
    pub class: EscalationClass,
    pub basis: DeadlineBasis,
    pub anchor_date: Option<NaiveDate>,
    /// Prerequisite *instance* id, resolved during materialization.
    pub prerequisite_id: Option<i64>,
    pub blocked: bool,
    /// Reiteration attempt counter (class A).
    pub attempts: i64,
    pub last_alert: Option<NaiveDate>,
    pub alert_status: AlertStatus,
    pub recurrence: Recurrence,
    /// `YYYY-MM` key for monthly instances; None for one-off tasks and
    /// recurrence roots.
    pub month_key: Option<String>,
    pub confirmation: bool,
}

impl TaskInstance {
    /// Days past the deadline (negative while still in the future).
    pub fn days_overdue(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|d| (today - d).num_days())
    }

    /// Whether this is a monthly placeholder rather than a dated task.
    pub fn is_recurrence_root(&self) -> bool {
        self.recurrence == Recurrence::Monthly && self.month_key.is_none()
    }
}

/// Append-only audit row written by the escalation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: i64,
    pub project_id: i64,
    pub instance_id: i64,
    pub alert_kind: String,
    pub sent_at: String,
    pub recipients: String,
    pub success: bool,
    pub error: Option<String>,
}
