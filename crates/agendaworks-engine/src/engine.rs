//! The engine facade: project and checklist operations for the UI
//! side, plus the daily escalation sweep for the background side.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use agendaworks_core::config::AgendaConfig;
use agendaworks_core::error::{AgendaError, Result};
use agendaworks_core::notify::{NotificationTransport, SendOutcome};

use crate::digest::{DigestEntry, ProjectDigest};
use crate::escalate::{self, Tier};
use crate::persistence::AgendaDb;
use crate::retry::with_retry;
use crate::tasks::{
    AnchorField, CriticalDate, EscalationRecord, Project, ProjectDraft, TaskInstance,
};

/// Outcome of one escalation sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    /// True when today's sweep already ran and this call did nothing.
    pub skipped: bool,
    /// Recurring instances stamped before evaluation.
    pub generated: usize,
    /// Open dated tasks considered.
    pub evaluated: usize,
    /// Tasks that fired an alert tier.
    pub alerts: usize,
}

pub struct Engine {
    db: AgendaDb,
    transport: Arc<dyn NotificationTransport>,
    config: AgendaConfig,
}

impl Engine {
    pub fn new(db: AgendaDb, transport: Arc<dyn NotificationTransport>, config: AgendaConfig) -> Self {
        Self { db, transport, config }
    }

    pub fn config(&self) -> &AgendaConfig {
        &self.config
    }

    fn retrying<T>(&self, op: impl FnMut() -> Result<T>) -> Result<T> {
        with_retry(
            self.config.sweep.retry_attempts,
            Duration::from_millis(self.config.sweep.retry_backoff_ms),
            op,
        )
    }

    fn validate(draft: &ProjectDraft) -> Result<()> {
        if draft.name.trim().is_empty() {
            return Err(AgendaError::Invalid("project name is required".into()));
        }
        if draft.client.trim().is_empty() {
            return Err(AgendaError::Invalid("client is required".into()));
        }
        if draft.contract_value <= 0.0 {
            return Err(AgendaError::Invalid("contract value must be positive".into()));
        }
        Ok(())
    }

    // ─── Projects ──────────────────────────────────────

    pub fn create_project(&self, draft: &ProjectDraft, today: NaiveDate) -> Result<i64> {
        Self::validate(draft)?;
        self.db.create_project(draft, today)
    }

    pub fn project(&self, id: i64) -> Result<Option<Project>> {
        self.db.project(id)
    }

    pub fn projects(&self, filter: Option<&str>) -> Result<Vec<Project>> {
        self.db.projects(filter)
    }

    /// Update a project. Returns true when a changed anchor date means
    /// deadlines should be recomputed; call [`Engine::recalculate`]
    /// once the user confirms.
    pub fn update_project(&self, id: i64, draft: &ProjectDraft) -> Result<bool> {
        Self::validate(draft)?;
        self.db.update_project(id, draft)
    }

    pub fn delete_project(&self, id: i64) -> Result<()> {
        self.db.delete_project(id)
    }

    // ─── Checklist ──────────────────────────────────────

    pub fn checklist(&self, project_id: i64) -> Result<Vec<TaskInstance>> {
        self.db.checklist(project_id)
    }

    pub fn set_task_completed(
        &self,
        instance_id: i64,
        completed: bool,
        today: NaiveDate,
    ) -> Result<Option<CriticalDate>> {
        self.db.set_instance_completed(instance_id, completed, today)
    }

    pub fn recalculate(
        &self,
        project_id: i64,
        field: AnchorField,
        new_value: Option<&str>,
        today: NaiveDate,
    ) -> Result<usize> {
        self.db.recalculate(project_id, field, new_value, today)
    }

    pub fn overdue(&self, today: NaiveDate) -> Result<Vec<crate::escalate::DueTask>> {
        self.db.overdue_instances(today)
    }

    pub fn escalation_log(&self, project_id: i64) -> Result<Vec<EscalationRecord>> {
        self.db.escalation_log(project_id)
    }

    pub fn generate_monthly(&self, today: NaiveDate) -> Result<usize> {
        self.retrying(|| self.db.generate_monthly(today))
    }

    // ─── Escalation sweep ──────────────────────────────────────

    /// Run the daily sweep: stamp recurring instances, classify every
    /// due task, send one digest per project, record bookkeeping.
    ///
    /// Guarded to once per calendar day unless `force`. Bookkeeping is
    /// stamped regardless of delivery success, so a broken SMTP setup
    /// degrades to log noise rather than an alert storm later.
    pub async fn run_sweep(&self, today: NaiveDate, force: bool) -> Result<SweepOutcome> {
        if !force && self.retrying(|| self.db.sweep_ran(today))? {
            tracing::debug!("sweep already ran on {today}, skipping");
            return Ok(SweepOutcome { skipped: true, ..SweepOutcome::default() });
        }

        let generated = match self.retrying(|| self.db.generate_monthly(today)) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("⚠️ recurring generation failed: {e}");
                0
            }
        };

        let due = self.retrying(|| self.db.due_tasks())?;
        let evaluated = due.len();

        // Group firing tasks into one digest per project.
        struct PendingDigest {
            digest: ProjectDigest,
            updates: Vec<(i64, i64, Tier)>,
        }
        let mut order: Vec<i64> = Vec::new();
        let mut pending: HashMap<i64, PendingDigest> = HashMap::new();

        for task in &due {
            let instance = &task.instance;
            if instance.last_alert == Some(today) {
                continue;
            }
            let Some(tier) = escalate::classify(instance, today) else {
                continue;
            };
            let Some(deadline) = instance.deadline else {
                continue;
            };
            let entry = pending.entry(instance.project_id).or_insert_with(|| {
                order.push(instance.project_id);
                PendingDigest {
                    digest: ProjectDigest::new(
                        instance.project_id,
                        task.project_name.clone(),
                        task.client.clone(),
                    ),
                    updates: Vec::new(),
                }
            });
            entry.digest.entries.push(DigestEntry {
                description: instance.description.clone(),
                deadline,
                days_overdue: instance.days_overdue(today).unwrap_or(0),
                tier,
            });
            entry.updates.push((instance.id, escalate::next_attempts(instance, tier), tier));
        }

        let recipients = self.config.mail.effective_recipients();
        let recipients_line = recipients.join(", ");
        let mut alerts = 0;

        for project_id in order {
            let Some(mut item) = pending.remove(&project_id) else {
                continue;
            };
            item.digest.sort_entries();

            let outcome = if self.transport.is_configured() {
                self.transport
                    .send(&recipients, &item.digest.subject(), &item.digest.html_body())
                    .await
            } else {
                SendOutcome::failure("mail transport not configured")
            };
            if outcome.success {
                tracing::info!(
                    "📧 Digest sent for project {project_id} ({} task(s))",
                    item.digest.entries.len()
                );
            } else {
                tracing::warn!(
                    "⚠️ Digest delivery failed for project {project_id}: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }

            for (instance_id, attempts, tier) in item.updates {
                let stamped = self.retrying(|| {
                    self.db.stamp_alert(instance_id, attempts, today, tier.status())?;
                    self.db.log_escalation(
                        project_id,
                        instance_id,
                        tier.alert_kind(),
                        &recipients_line,
                        outcome.success,
                        outcome.error.as_deref(),
                    )
                });
                match stamped {
                    Ok(_) => alerts += 1,
                    Err(e) => {
                        tracing::error!("failed to record alert for task {instance_id}: {e}");
                    }
                }
            }
        }

        self.retrying(|| self.db.record_sweep(today, evaluated, alerts))?;
        tracing::info!("✅ Sweep done: {evaluated} task(s) evaluated, {alerts} alert(s)");
        Ok(SweepOutcome { skipped: false, generated, evaluated, alerts })
    }
}
