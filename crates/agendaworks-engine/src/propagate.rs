//! Dependency propagator: reacts to completion toggles.
//!
//! Completing a task unblocks its direct dependents and anchors their
//! deadlines on the completion date. Un-completing re-blocks direct
//! dependents one hop deep; transitive dependents were already blocked
//! by their own prerequisite and stay untouched. Escalation counters
//! survive a re-block so alert history is not forgotten.

use chrono::{Duration, NaiveDate};
use rusqlite::{OptionalExtension, Transaction, params};

use agendaworks_core::error::{AgendaError, Result};

use crate::persistence::db_err;
use crate::tasks::CriticalDate;

/// Toggle completion on one instance and propagate to its dependents.
/// On completion, returns the critical project date the task unlocks
/// so the caller can prompt for it.
pub fn set_completed(
    tx: &Transaction<'_>,
    instance_id: i64,
    completed: bool,
    today: NaiveDate,
) -> Result<Option<CriticalDate>> {
    if completed {
        let stamp = today.format("%Y-%m-%d").to_string();
        let n = tx
            .execute(
                "UPDATE task_instances SET completed = 1, completed_on = ?1 WHERE id = ?2",
                params![stamp, instance_id],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(AgendaError::Store(format!("task instance {instance_id} not found")));
        }

        // Unblock direct dependents, anchored on the completion date.
        let dependents: Vec<(i64, i64)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, offset_days FROM task_instances \
                     WHERE prerequisite_id = ?1 AND completed = 0",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![instance_id], |r| Ok((r.get(0)?, r.get(1)?)))
                .map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
        };
        for (dep_id, offset) in dependents {
            let deadline = today + Duration::days(offset);
            tx.execute(
                "UPDATE task_instances SET blocked = 0, deadline = ?1, anchor_date = ?2 \
                 WHERE id = ?3",
                params![deadline.format("%Y-%m-%d").to_string(), stamp, dep_id],
            )
            .map_err(db_err)?;
        }

        let trigger: Option<String> = tx
            .query_row(
                "SELECT t.trigger_date FROM task_instances i \
                 JOIN task_templates t ON t.id = i.template_id WHERE i.id = ?1",
                params![instance_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?
            .flatten();
        Ok(trigger.as_deref().and_then(CriticalDate::from_str))
    } else {
        let n = tx
            .execute(
                "UPDATE task_instances SET completed = 0, completed_on = NULL WHERE id = ?1",
                params![instance_id],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(AgendaError::Store(format!("task instance {instance_id} not found")));
        }
        // Direct dependents lose their anchor again. Attempts and
        // alert_status are deliberately left alone.
        tx.execute(
            "UPDATE task_instances SET blocked = 1, deadline = NULL, anchor_date = NULL \
             WHERE prerequisite_id = ?1 AND completed = 0",
            params![instance_id],
        )
        .map_err(db_err)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AgendaDb;
    use crate::tasks::{ProjectDraft, TaskInstance};

    fn test_db(name: &str) -> (AgendaDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("agendaworks-prop-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (AgendaDb::open(&dir.join("agenda.db")).unwrap(), dir)
    }

    fn seed_project(db: &AgendaDb, today: NaiveDate) -> i64 {
        db.create_project(
            &ProjectDraft {
                name: "Branch remodel".into(),
                client: "Acme Bank".into(),
                contract_value: 50_000.0,
                start_date: Some("2026-03-01".into()),
                ..ProjectDraft::default()
            },
            today,
        )
        .unwrap()
    }

    fn by_name(db: &AgendaDb, project: i64, name: &str) -> TaskInstance {
        db.checklist(project)
            .unwrap()
            .into_iter()
            .find(|t| t.description == name)
            .unwrap()
    }

    #[test]
    fn test_completion_unblocks_dependent() {
        let (db, dir) = test_db("unblock");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today);

        let first = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        db.set_instance_completed(first.id, true, today).unwrap();

        // REVIEW: +3 days from the completion date.
        let review = by_name(&db, project, "REVIEW");
        assert!(!review.blocked);
        assert_eq!(review.deadline, NaiveDate::from_ymd_opt(2026, 3, 13));
        assert_eq!(review.anchor_date, Some(today));

        // Transitive dependent is still blocked by its own prerequisite.
        let manager = by_name(&db, project, "MANAGER REVIEW");
        assert!(manager.blocked);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_uncompleting_reblocks_one_hop() {
        let (db, dir) = test_db("reblock");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today);

        let first = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        db.set_instance_completed(first.id, true, today).unwrap();
        db.set_instance_completed(first.id, false, today).unwrap();

        let review = by_name(&db, project, "REVIEW");
        assert!(review.blocked);
        assert_eq!(review.deadline, None);

        let reopened = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        assert!(!reopened.completed);
        assert_eq!(reopened.completed_on, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reblock_keeps_escalation_counters() {
        let (db, dir) = test_db("counters");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today);

        let first = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        db.set_instance_completed(first.id, true, today).unwrap();

        let review = by_name(&db, project, "REVIEW");
        db.stamp_alert(review.id, 2, today, crate::tasks::AlertStatus::Alerted)
            .unwrap();

        db.set_instance_completed(first.id, false, today).unwrap();
        let review = by_name(&db, project, "REVIEW");
        assert_eq!(review.attempts, 2);
        assert_eq!(review.alert_status, crate::tasks::AlertStatus::Alerted);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_completing_dependent_of_incomplete_prerequisite_stays_put() {
        let (db, dir) = test_db("manual");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today);

        // Completing a blocked task directly is allowed; it simply no
        // longer reacts to prerequisite changes.
        let review = by_name(&db, project, "REVIEW");
        db.set_instance_completed(review.id, true, today).unwrap();

        let first = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        db.set_instance_completed(first.id, true, today).unwrap();
        let review = by_name(&db, project, "REVIEW");
        assert!(review.completed);
        // Completed dependents are not re-anchored.
        assert_eq!(review.deadline, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_contract_signed_returns_signature_trigger() {
        let (db, dir) = test_db("trigger");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let project = seed_project(&db, today);

        let signed = by_name(&db, project, "CONTRACT SIGNED");
        let trigger = db.set_instance_completed(signed.id, true, today).unwrap();
        assert_eq!(trigger, Some(CriticalDate::Signature));

        let auth = by_name(&db, project, "REQUEST AUTHORIZATION DATE");
        let trigger = db.set_instance_completed(auth.id, true, today).unwrap();
        assert_eq!(trigger, Some(CriticalDate::Authorization));

        let first = by_name(&db, project, "PROJECT AND BUDGET RETURN");
        let trigger = db.set_instance_completed(first.id, true, today).unwrap();
        assert_eq!(trigger, None);
        std::fs::remove_dir_all(&dir).ok();
    }
}
