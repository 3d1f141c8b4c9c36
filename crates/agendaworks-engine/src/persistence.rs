//! SQLite-backed persistence for projects, the template catalog, task
//! instances, the escalation log and the daily sweep marker.
//!
//! WAL mode plus a busy timeout; anything SQLite still rejects under
//! contention surfaces as [`AgendaError::Busy`] so background callers
//! can retry with bounded backoff.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};

use agendaworks_core::error::{AgendaError, Result};

use crate::anchor::parse_date;
use crate::catalog::DEFAULT_TEMPLATES;
use crate::escalate::DueTask;
use crate::tasks::{
    AlertStatus, AnchorField, CriticalDate, DeadlineBasis, EscalationClass, EscalationRecord,
    Project, ProjectDraft, ProjectStatus, Recurrence, TaskInstance, TaskTemplate,
};
use crate::{materialize, propagate, recalc, recurring};

/// Persistent store for all engine data.
pub struct AgendaDb {
    conn: Mutex<Connection>,
}

pub(crate) const PROJECT_COLS: &str = "id, name, client, contract_value, start_date, status, \
     created_at, contract_number, agency_prefix, service, partner_value, percentage, \
     total_value, execution_month, execution_year, completion_date, signature_date, \
     authorization_date";

pub(crate) const INSTANCE_COLS: &str = "id, project_id, template_id, description, offset_days, \
     deadline, completed, completed_on, class, basis, anchor_date, prerequisite_id, blocked, \
     attempts, last_alert, alert_status, recurrence, month_key, confirmation";

const INSTANCE_COLS_JOINED: &str = "i.id, i.project_id, i.template_id, i.description, \
     i.offset_days, i.deadline, i.completed, i.completed_on, i.class, i.basis, i.anchor_date, \
     i.prerequisite_id, i.blocked, i.attempts, i.last_alert, i.alert_status, i.recurrence, \
     i.month_key, i.confirmation";

/// Map a rusqlite error, distinguishing lock contention from real faults.
pub(crate) fn db_err(e: rusqlite::Error) -> AgendaError {
    if let rusqlite::Error::SqliteFailure(code, _) = &e {
        if matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ) {
            return AgendaError::Busy;
        }
    }
    AgendaError::Store(e.to_string())
}

pub(crate) fn map_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        client: row.get(2)?,
        contract_value: row.get(3)?,
        start_date: row.get(4)?,
        status: ProjectStatus::from_str(&row.get::<_, String>(5)?),
        created_at: row.get(6)?,
        contract_number: row.get(7)?,
        agency_prefix: row.get(8)?,
        service: row.get(9)?,
        partner_value: row.get(10)?,
        percentage: row.get(11)?,
        total_value: row.get(12)?,
        execution_month: row.get(13)?,
        execution_year: row.get(14)?,
        completion_date: row.get(15)?,
        signature_date: row.get(16)?,
        authorization_date: row.get(17)?,
    })
}

pub(crate) fn map_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskInstance> {
    let date_at = |idx: usize| -> rusqlite::Result<Option<NaiveDate>> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .as_deref()
            .and_then(parse_date))
    };
    Ok(TaskInstance {
        id: row.get(0)?,
        project_id: row.get(1)?,
        template_id: row.get(2)?,
        description: row.get(3)?,
        offset_days: row.get(4)?,
        deadline: date_at(5)?,
        completed: row.get::<_, i64>(6)? != 0,
        completed_on: date_at(7)?,
        class: EscalationClass::from_str(&row.get::<_, String>(8)?),
        basis: DeadlineBasis::from_str(&row.get::<_, String>(9)?),
        anchor_date: date_at(10)?,
        prerequisite_id: row.get(11)?,
        blocked: row.get::<_, i64>(12)? != 0,
        attempts: row.get(13)?,
        last_alert: date_at(14)?,
        alert_status: AlertStatus::from_str(&row.get::<_, String>(15)?),
        recurrence: Recurrence::from_str(&row.get::<_, String>(16)?),
        month_key: row.get(17)?,
        confirmation: row.get::<_, i64>(18)? != 0,
    })
}

fn map_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskTemplate> {
    Ok(TaskTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        sequence: row.get(2)?,
        offset_days: row.get(3)?,
        class: EscalationClass::from_str(&row.get::<_, String>(4)?),
        basis: DeadlineBasis::from_str(&row.get::<_, String>(5)?),
        prerequisite_id: row.get(6)?,
        recurrence: Recurrence::from_str(&row.get::<_, String>(7)?),
        month_day: row.get(8)?,
        trigger: row
            .get::<_, Option<String>>(9)?
            .as_deref()
            .and_then(CriticalDate::from_str),
        confirmation: row.get::<_, i64>(10)? != 0,
    })
}

/// Read one project inside an open connection or transaction.
pub(crate) fn read_project(conn: &Connection, id: i64) -> Result<Option<Project>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"),
        params![id],
        map_project,
    )
    .optional()
    .map_err(db_err)
}

/// Read the full catalog in sequence order.
pub(crate) fn read_templates(conn: &Connection) -> Result<Vec<TaskTemplate>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, sequence, offset_days, class, basis, prerequisite_id, recurrence, \
             month_day, trigger_date, confirmation FROM task_templates ORDER BY sequence",
        )
        .map_err(db_err)?;
    let rows = stmt.query_map([], map_template).map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

/// Trim a user-supplied optional field, mapping empty strings to None.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AgendaDb {
    /// Open or create the database, run migrations and seed the catalog.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        // WAL for concurrent readers; busy timeout before Busy surfaces.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .ok();
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        db.seed_templates()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AgendaError::Store("store mutex poisoned".into()))
    }

    /// Create tables and indexes.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                client TEXT NOT NULL,
                contract_value REAL NOT NULL,
                start_date TEXT,
                status TEXT NOT NULL DEFAULT 'Not Started',
                created_at TEXT NOT NULL,
                contract_number TEXT,
                agency_prefix TEXT,
                service TEXT,
                partner_value REAL,
                percentage REAL,
                total_value REAL,
                execution_month TEXT,
                execution_year INTEGER,
                completion_date TEXT,
                signature_date TEXT,
                authorization_date TEXT
            );

            CREATE TABLE IF NOT EXISTS task_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                offset_days INTEGER NOT NULL,
                class TEXT NOT NULL DEFAULT 'A',
                basis TEXT NOT NULL DEFAULT 'start',
                prerequisite_id INTEGER REFERENCES task_templates(id),
                recurrence TEXT NOT NULL DEFAULT 'one-off',
                month_day INTEGER,
                trigger_date TEXT,
                confirmation INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS task_instances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id),
                template_id INTEGER NOT NULL REFERENCES task_templates(id),
                description TEXT NOT NULL,
                offset_days INTEGER NOT NULL,
                deadline TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                completed_on TEXT,
                class TEXT NOT NULL DEFAULT 'A',
                basis TEXT NOT NULL DEFAULT 'start',
                anchor_date TEXT,
                prerequisite_id INTEGER REFERENCES task_instances(id),
                blocked INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_alert TEXT,
                alert_status TEXT NOT NULL DEFAULT 'pending',
                recurrence TEXT NOT NULL DEFAULT 'one-off',
                month_key TEXT,
                confirmation INTEGER NOT NULL DEFAULT 0
            );

            -- Structural idempotence for the recurring generator:
            -- at most one instance per project, template and month.
            CREATE UNIQUE INDEX IF NOT EXISTS ux_instances_month
                ON task_instances(project_id, template_id, month_key)
                WHERE month_key IS NOT NULL;

            CREATE TABLE IF NOT EXISTS escalation_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                instance_id INTEGER NOT NULL,
                alert_kind TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                recipients TEXT NOT NULL DEFAULT '',
                success INTEGER NOT NULL DEFAULT 1,
                error TEXT
            );

            CREATE TABLE IF NOT EXISTS sweep_log (
                sweep_date TEXT PRIMARY KEY,
                ran_at TEXT NOT NULL,
                tasks_evaluated INTEGER NOT NULL,
                alerts_sent INTEGER NOT NULL
            );
            ",
            )
            .map_err(db_err)
    }

    /// Seed the default template catalog on first open.
    fn seed_templates(&self) -> Result<()> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM task_templates", [], |r| r.get(0))
            .map_err(db_err)?;
        if count > 0 {
            return Ok(());
        }

        let mut id_by_seq: HashMap<i64, i64> = HashMap::new();
        for seed in DEFAULT_TEMPLATES {
            let prerequisite_id = seed
                .prerequisite_seq
                .and_then(|seq| id_by_seq.get(&seq))
                .copied();
            conn.execute(
                "INSERT INTO task_templates \
                 (name, sequence, offset_days, class, basis, prerequisite_id, recurrence, \
                  month_day, trigger_date, confirmation) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    seed.name,
                    seed.sequence,
                    seed.offset_days,
                    seed.class.as_str(),
                    seed.basis.as_str(),
                    prerequisite_id,
                    seed.recurrence.as_str(),
                    seed.month_day,
                    seed.trigger.map(|t| t.as_str()),
                    seed.confirmation as i64,
                ],
            )
            .map_err(db_err)?;
            id_by_seq.insert(seed.sequence, conn.last_insert_rowid());
        }
        tracing::info!("📋 Seeded {} checklist templates", DEFAULT_TEMPLATES.len());
        Ok(())
    }

    /// The template catalog, in sequence order.
    pub fn templates(&self) -> Result<Vec<TaskTemplate>> {
        read_templates(&*self.lock()?)
    }

    // ─── Projects ──────────────────────────────────────

    /// Create a project and materialize its full checklist in one
    /// transaction. A partial checklist never exists.
    pub fn create_project(&self, draft: &ProjectDraft, today: NaiveDate) -> Result<i64> {
        let mut conn = self.lock()?;
        let templates = read_templates(&conn)?;
        let tx = conn.transaction().map_err(db_err)?;

        let created_at = format!("{} {}", today.format("%Y-%m-%d"), Local::now().format("%H:%M:%S"));
        tx.execute(
            "INSERT INTO projects \
             (name, client, contract_value, start_date, status, created_at, contract_number, \
              agency_prefix, service, partner_value, percentage, total_value, execution_month, \
              execution_year, completion_date, signature_date, authorization_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                draft.name,
                draft.client,
                draft.contract_value,
                clean(&draft.start_date),
                draft.status.as_str(),
                created_at,
                clean(&draft.contract_number),
                clean(&draft.agency_prefix),
                clean(&draft.service),
                draft.partner_value,
                draft.percentage,
                draft.total_value,
                clean(&draft.execution_month),
                draft.execution_year,
                clean(&draft.completion_date),
                clean(&draft.signature_date),
                clean(&draft.authorization_date),
            ],
        )
        .map_err(db_err)?;
        let project_id = tx.last_insert_rowid();

        materialize::build_checklist(&tx, project_id, &templates, today)?;

        tx.commit().map_err(db_err)?;
        tracing::info!("🏗️ Project {project_id} created with full checklist");
        Ok(project_id)
    }

    pub fn project(&self, id: i64) -> Result<Option<Project>> {
        read_project(&*self.lock()?, id)
    }

    /// List projects, optionally filtered on name, client or status.
    pub fn projects(&self, filter: Option<&str>) -> Result<Vec<Project>> {
        let conn = self.lock()?;
        if let Some(f) = filter {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {PROJECT_COLS} FROM projects \
                     WHERE name LIKE ?1 OR client LIKE ?1 OR status LIKE ?1 \
                     ORDER BY start_date DESC"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![format!("%{f}%")], map_project)
                .map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
        } else {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {PROJECT_COLS} FROM projects ORDER BY start_date DESC"
                ))
                .map_err(db_err)?;
            let rows = stmt.query_map([], map_project).map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
        }
    }

    /// Update a project. Returns true when a changed anchor date touches
    /// existing instances, so the caller can confirm recomputation.
    pub fn update_project(&self, id: i64, draft: &ProjectDraft) -> Result<bool> {
        let conn = self.lock()?;
        let old = read_project(&conn, id)?
            .ok_or_else(|| AgendaError::Store(format!("project {id} not found")))?;

        let start_date = clean(&draft.start_date);
        let signature_date = clean(&draft.signature_date);
        let authorization_date = clean(&draft.authorization_date);

        conn.execute(
            "UPDATE projects SET name = ?1, client = ?2, contract_value = ?3, start_date = ?4, \
             status = ?5, contract_number = ?6, agency_prefix = ?7, service = ?8, \
             partner_value = ?9, percentage = ?10, total_value = ?11, execution_month = ?12, \
             execution_year = ?13, completion_date = ?14, signature_date = ?15, \
             authorization_date = ?16 WHERE id = ?17",
            params![
                draft.name,
                draft.client,
                draft.contract_value,
                start_date,
                draft.status.as_str(),
                clean(&draft.contract_number),
                clean(&draft.agency_prefix),
                clean(&draft.service),
                draft.partner_value,
                draft.percentage,
                draft.total_value,
                clean(&draft.execution_month),
                draft.execution_year,
                clean(&draft.completion_date),
                signature_date,
                authorization_date,
                id,
            ],
        )
        .map_err(db_err)?;

        let mut requires_recalc = false;
        if old.start_date != start_date {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM task_instances WHERE project_id = ?1 AND basis = 'start'",
                    params![id],
                    |r| r.get(0),
                )
                .map_err(db_err)?;
            requires_recalc |= count > 0;
        }
        if old.signature_date != signature_date || old.authorization_date != authorization_date {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM task_instances WHERE project_id = ?1 \
                     AND completed = 1 AND basis IN ('signature', 'authorization')",
                    params![id],
                    |r| r.get(0),
                )
                .map_err(db_err)?;
            requires_recalc |= count > 0;
        }
        Ok(requires_recalc)
    }

    /// Delete a project and its checklist. Escalation log rows are
    /// audit history and stay.
    pub fn delete_project(&self, id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM task_instances WHERE project_id = ?1", params![id])
            .map_err(db_err)?;
        tx.execute("DELETE FROM projects WHERE id = ?1", params![id])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)
    }

    // ─── Task instances ──────────────────────────────────────

    /// The project's checklist in creation order.
    pub fn checklist(&self, project_id: i64) -> Result<Vec<TaskInstance>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INSTANCE_COLS} FROM task_instances WHERE project_id = ?1 ORDER BY id"
            ))
            .map_err(db_err)?;
        let rows = stmt.query_map(params![project_id], map_instance).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn instance(&self, id: i64) -> Result<Option<TaskInstance>> {
        self.lock()?
            .query_row(
                &format!("SELECT {INSTANCE_COLS} FROM task_instances WHERE id = ?1"),
                params![id],
                map_instance,
            )
            .optional()
            .map_err(db_err)
    }

    /// Toggle completion with dependency propagation. Returns the
    /// critical project date this completion unlocks, if any.
    pub fn set_instance_completed(
        &self,
        id: i64,
        completed: bool,
        today: NaiveDate,
    ) -> Result<Option<CriticalDate>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let trigger = propagate::set_completed(&tx, id, completed, today)?;
        tx.commit().map_err(db_err)?;
        Ok(trigger)
    }

    /// Re-anchor open instances after a project date change (§4.5).
    pub fn recalculate(
        &self,
        project_id: i64,
        field: AnchorField,
        new_value: Option<&str>,
        today: NaiveDate,
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let affected = recalc::apply(&tx, project_id, field, new_value, today)?;
        tx.commit().map_err(db_err)?;
        Ok(affected)
    }

    /// Generate this month's recurring instances for every active
    /// project. Idempotent: safe to call many times per day. One
    /// project's failure does not abort the others.
    pub fn generate_monthly(&self, today: NaiveDate) -> Result<usize> {
        let mut conn = self.lock()?;
        let templates = read_templates(&conn)?;
        let monthly: Vec<_> = templates
            .into_iter()
            .filter(|t| t.recurrence == Recurrence::Monthly)
            .collect();

        let projects = {
            let mut stmt = conn
                .prepare(&format!("SELECT {PROJECT_COLS} FROM projects"))
                .map_err(db_err)?;
            let rows = stmt.query_map([], map_project).map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
        };

        let mut created = 0;
        for project in &projects {
            if !recurring::is_active(project, today) {
                continue;
            }
            let tx = conn.transaction().map_err(db_err)?;
            match recurring::generate_for_project(&tx, project, &monthly, today) {
                Ok(n) => {
                    tx.commit().map_err(db_err)?;
                    created += n;
                }
                Err(AgendaError::Busy) => return Err(AgendaError::Busy),
                Err(e) => {
                    tracing::warn!("recurring generation failed for project {}: {e}", project.id);
                }
            }
        }
        Ok(created)
    }

    /// Open, unblocked, dated instances joined with their project, in
    /// deadline order. Input set for the escalation sweep.
    pub fn due_tasks(&self) -> Result<Vec<DueTask>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INSTANCE_COLS_JOINED}, p.name, p.client \
                 FROM task_instances i JOIN projects p ON p.id = i.project_id \
                 WHERE i.completed = 0 AND i.blocked = 0 AND i.deadline IS NOT NULL \
                 ORDER BY i.deadline"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DueTask {
                    instance: map_instance(row)?,
                    project_name: row.get(19)?,
                    client: row.get(20)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Open instances whose deadline has already passed.
    pub fn overdue_instances(&self, today: NaiveDate) -> Result<Vec<DueTask>> {
        let all = self.due_tasks()?;
        Ok(all
            .into_iter()
            .filter(|t| t.instance.days_overdue(today).is_some_and(|d| d > 0))
            .collect())
    }

    /// Stamp escalation bookkeeping after an alert attempt.
    pub fn stamp_alert(
        &self,
        id: i64,
        attempts: i64,
        today: NaiveDate,
        status: AlertStatus,
    ) -> Result<()> {
        self.lock()?
            .execute(
                "UPDATE task_instances SET attempts = ?1, last_alert = ?2, alert_status = ?3 \
                 WHERE id = ?4",
                params![attempts, today.format("%Y-%m-%d").to_string(), status.as_str(), id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Escalation audit ──────────────────────────────────────

    /// Append one escalation record (per task, not per email).
    pub fn log_escalation(
        &self,
        project_id: i64,
        instance_id: i64,
        alert_kind: &str,
        recipients: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO escalation_log \
             (project_id, instance_id, alert_kind, sent_at, recipients, success, error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project_id,
                instance_id,
                alert_kind,
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                recipients,
                success as i64,
                error,
            ],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Escalation history for one project, oldest first.
    pub fn escalation_log(&self, project_id: i64) -> Result<Vec<EscalationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, instance_id, alert_kind, sent_at, recipients, success, \
                 error FROM escalation_log WHERE project_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(EscalationRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    instance_id: row.get(2)?,
                    alert_kind: row.get(3)?,
                    sent_at: row.get(4)?,
                    recipients: row.get(5)?,
                    success: row.get::<_, i64>(6)? != 0,
                    error: row.get(7)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    // ─── Sweep marker ──────────────────────────────────────

    /// Whether the daily sweep already ran on `date`.
    pub fn sweep_ran(&self, date: NaiveDate) -> Result<bool> {
        let found: Option<String> = self
            .lock()?
            .query_row(
                "SELECT sweep_date FROM sweep_log WHERE sweep_date = ?1",
                params![date.format("%Y-%m-%d").to_string()],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    /// Persist the sweep outcome, zero-task runs included.
    pub fn record_sweep(&self, date: NaiveDate, evaluated: usize, alerts: usize) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO sweep_log (sweep_date, ran_at, tasks_evaluated, alerts_sent) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    date.format("%Y-%m-%d").to_string(),
                    Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    evaluated as i64,
                    alerts as i64,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db(name: &str) -> (AgendaDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("agendaworks-db-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (AgendaDb::open(&dir.join("agenda.db")).unwrap(), dir)
    }

    fn draft(name: &str, start: Option<&str>) -> ProjectDraft {
        ProjectDraft {
            name: name.into(),
            client: "Acme Bank".into(),
            contract_value: 50_000.0,
            start_date: start.map(str::to_string),
            ..ProjectDraft::default()
        }
    }

    #[test]
    fn test_open_seeds_catalog() {
        let (db, dir) = test_db("seed");
        let templates = db.templates().unwrap();
        assert_eq!(templates.len(), 18);
        // Prerequisite seeds resolved to row ids in order.
        let review = templates.iter().find(|t| t.name == "REVIEW").unwrap();
        let first = templates
            .iter()
            .find(|t| t.name == "PROJECT AND BUDGET RETURN")
            .unwrap();
        assert_eq!(review.prerequisite_id, Some(first.id));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_create_and_fetch_project() {
        let (db, dir) = test_db("create");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let id = db.create_project(&draft("Branch remodel", Some("2026-03-01")), today).unwrap();
        let project = db.project(id).unwrap().unwrap();
        assert_eq!(project.name, "Branch remodel");
        // One instance per template, monthly roots included.
        assert_eq!(db.checklist(id).unwrap().len(), 18);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_strings_normalize_to_null() {
        let (db, dir) = test_db("clean");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let id = db.create_project(&draft("P", Some("  ")), today).unwrap();
        assert!(db.project(id).unwrap().unwrap().start_date.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_update_signals_recalculation() {
        let (db, dir) = test_db("update-signal");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let id = db.create_project(&draft("P", Some("2026-03-01")), today).unwrap();
        let mut changed = draft("P", Some("2026-04-01"));
        assert!(db.update_project(id, &changed).unwrap());
        // Same dates again: nothing to recompute.
        changed.start_date = Some("2026-04-01".into());
        assert!(!db.update_project(id, &changed).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_delete_cascades_to_checklist() {
        let (db, dir) = test_db("delete");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let id = db.create_project(&draft("P", None), today).unwrap();
        db.delete_project(id).unwrap();
        assert!(db.project(id).unwrap().is_none());
        assert!(db.checklist(id).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sweep_marker_round_trip() {
        let (db, dir) = test_db("sweep-marker");
        let day = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert!(!db.sweep_ran(day).unwrap());
        db.record_sweep(day, 0, 0).unwrap();
        assert!(db.sweep_ran(day).unwrap());
        assert!(!db.sweep_ran(day.succ_opt().unwrap()).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }
}
