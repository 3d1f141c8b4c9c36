//! Deadline recalculator: re-anchors open instances after a project
//! date changes.
//!
//! Only open (not completed) instances move. Completed instances keep
//! the deadline they were finished against. A recomputed task gets a
//! fresh escalation state: attempts back to zero, status pending.

use chrono::{Duration, NaiveDate};
use rusqlite::{Transaction, params};

use agendaworks_core::error::{AgendaError, Result};

use crate::anchor::parse_date;
use crate::persistence::db_err;
use crate::tasks::AnchorField;

/// Apply a changed (or cleared) anchor date to `project_id`'s open
/// instances of the matching basis. Returns the number of instances
/// touched. Does not write the project row itself.
pub fn apply(
    tx: &Transaction<'_>,
    project_id: i64,
    field: AnchorField,
    new_value: Option<&str>,
    today: NaiveDate,
) -> Result<usize> {
    let basis = field.basis().as_str();
    let value = new_value.map(str::trim).filter(|s| !s.is_empty());

    let Some(raw) = value else {
        // Cleared anchor: open instances lose their deadline and block.
        let n = tx
            .execute(
                "UPDATE task_instances SET blocked = 1, deadline = NULL, anchor_date = NULL \
                 WHERE project_id = ?1 AND basis = ?2 AND completed = 0 \
                 AND month_key IS NULL",
                params![project_id, basis],
            )
            .map_err(db_err)?;
        return Ok(n);
    };

    let anchor = parse_date(raw).ok_or_else(|| AgendaError::Date {
        field: field.as_str().to_string(),
        value: raw.to_string(),
    })?;

    if field == AnchorField::Start {
        // Recurrence roots follow the start date: blocked while the
        // project has not started, released once it has.
        let blocked = (anchor > today) as i64;
        tx.execute(
            "UPDATE task_instances SET blocked = ?1, anchor_date = ?2 \
             WHERE project_id = ?3 AND recurrence = 'monthly' AND month_key IS NULL \
             AND completed = 0",
            params![blocked, anchor.format("%Y-%m-%d").to_string(), project_id],
        )
        .map_err(db_err)?;
    }

    // One-off instances of this basis: deadline = anchor + offset.
    let targets: Vec<(i64, i64)> = {
        let mut stmt = tx
            .prepare(
                "SELECT id, offset_days FROM task_instances \
                 WHERE project_id = ?1 AND basis = ?2 AND completed = 0 \
                 AND recurrence = 'one-off'",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![project_id, basis], |r| Ok((r.get(0)?, r.get(1)?)))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
    };

    for (id, offset) in &targets {
        let deadline = anchor + Duration::days(*offset);
        tx.execute(
            "UPDATE task_instances SET deadline = ?1, anchor_date = ?2, blocked = 0, \
             attempts = 0, alert_status = 'pending' WHERE id = ?3",
            params![
                deadline.format("%Y-%m-%d").to_string(),
                anchor.format("%Y-%m-%d").to_string(),
                id,
            ],
        )
        .map_err(db_err)?;
    }

    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AgendaDb;
    use crate::tasks::{AlertStatus, DeadlineBasis, ProjectDraft};

    fn test_db(name: &str) -> (AgendaDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("agendaworks-recalc-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (AgendaDb::open(&dir.join("agenda.db")).unwrap(), dir)
    }

    fn seed_project(db: &AgendaDb, today: NaiveDate, start: Option<&str>) -> i64 {
        db.create_project(
            &ProjectDraft {
                name: "Branch remodel".into(),
                client: "Acme Bank".into(),
                contract_value: 50_000.0,
                start_date: start.map(str::to_string),
                ..ProjectDraft::default()
            },
            today,
        )
        .unwrap()
    }

    #[test]
    fn test_setting_signature_unblocks_and_anchors() {
        let (db, dir) = test_db("signature");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        let touched = db
            .recalculate(project, AnchorField::Signature, Some("2026-03-15"), today)
            .unwrap();
        // Seven signature-anchored one-off tasks in the catalog.
        assert_eq!(touched, 7);

        let permit = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .find(|t| t.description == "TECHNICAL LIABILITY PERMIT")
            .unwrap();
        assert!(!permit.blocked);
        assert_eq!(permit.deadline, NaiveDate::from_ymd_opt(2026, 3, 20));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_clearing_start_blocks_open_tasks_and_roots() {
        let (db, dir) = test_db("clear-start");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        db.recalculate(project, AnchorField::Start, None, today).unwrap();

        for task in db.checklist(project).unwrap() {
            if task.basis == DeadlineBasis::Start {
                assert!(task.blocked, "{} should block", task.description);
                assert_eq!(task.deadline, None);
            }
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_completed_tasks_keep_their_deadline() {
        let (db, dir) = test_db("completed-kept");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        let hiring = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .find(|t| t.description == "STAFF HIRING")
            .unwrap();
        let old_deadline = hiring.deadline;
        db.set_instance_completed(hiring.id, true, today).unwrap();

        db.recalculate(project, AnchorField::Start, Some("2026-05-01"), today).unwrap();

        let hiring = db.instance(hiring.id).unwrap().unwrap();
        assert_eq!(hiring.deadline, old_deadline);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_recompute_resets_escalation_state() {
        let (db, dir) = test_db("reset");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        let access = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .find(|t| t.description == "ACCESS REQUEST")
            .unwrap();
        db.stamp_alert(access.id, 2, today, AlertStatus::Alerted).unwrap();

        db.recalculate(project, AnchorField::Start, Some("2026-05-01"), today).unwrap();

        let access = db.instance(access.id).unwrap().unwrap();
        assert_eq!(access.attempts, 0);
        assert_eq!(access.alert_status, AlertStatus::Pending);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let (db, dir) = test_db("malformed");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        let err = db
            .recalculate(project, AnchorField::Start, Some("03/15/2026"), today)
            .unwrap_err();
        assert!(matches!(err, AgendaError::Date { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_future_start_blocks_recurrence_roots() {
        let (db, dir) = test_db("future-roots");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today, Some("2026-03-01"));

        db.recalculate(project, AnchorField::Start, Some("2026-06-01"), today).unwrap();
        let roots: Vec<_> = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .filter(|t| t.is_recurrence_root())
            .collect();
        assert!(roots.iter().all(|r| r.blocked));

        db.recalculate(project, AnchorField::Start, Some("2026-03-01"), today).unwrap();
        let roots: Vec<_> = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .filter(|t| t.is_recurrence_root())
            .collect();
        assert!(roots.iter().all(|r| !r.blocked));
        std::fs::remove_dir_all(&dir).ok();
    }
}
