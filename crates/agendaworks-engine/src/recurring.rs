//! Recurring instance generator: stamps this month's copy of each
//! monthly template for every active project.
//!
//! Idempotence is structural: a unique index over (project, template,
//! month_key) plus an existence check make repeated runs in the same
//! month a no-op.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{OptionalExtension, Transaction, params};

use agendaworks_core::error::Result;

use crate::anchor;
use crate::persistence::db_err;
use crate::tasks::{Project, ProjectStatus, TaskTemplate};

/// Whether `project` accrues recurring work this month: started, not
/// completed, and not past its completion date.
pub fn is_active(project: &Project, today: NaiveDate) -> bool {
    if project.status == ProjectStatus::Completed {
        return false;
    }
    if !anchor::has_started(project, today) {
        return false;
    }
    match project.completion_date.as_deref().and_then(anchor::parse_date) {
        Some(done) => done >= today,
        None => true,
    }
}

/// Deadline for a day-of-month anchor in `today`'s month, clamped to
/// the last day when the month is shorter.
pub fn month_deadline(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(today.year(), today.month(), day)
        .or_else(|| last_day_of_month(today.year(), today.month()))
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    Some(NaiveDate::from_ymd_opt(next_year, next_month, 1)? - Duration::days(1))
}

/// Generate this month's instances for one project inside its own
/// transaction. Returns the number created (0 on a repeat run).
pub fn generate_for_project(
    tx: &Transaction<'_>,
    project: &Project,
    monthly_templates: &[TaskTemplate],
    today: NaiveDate,
) -> Result<usize> {
    // The project is active, so any root still blocked from a
    // pre-start materialization can be released.
    tx.execute(
        "UPDATE task_instances SET blocked = 0 \
         WHERE project_id = ?1 AND recurrence = 'monthly' AND month_key IS NULL \
         AND blocked = 1",
        params![project.id],
    )
    .map_err(db_err)?;

    let month_key = today.format("%Y-%m").to_string();
    let anchor_date = anchor::resolve(project, crate::tasks::DeadlineBasis::Start);

    let mut created = 0;
    for template in monthly_templates {
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM task_instances \
                 WHERE project_id = ?1 AND template_id = ?2 AND month_key = ?3",
                params![project.id, template.id, month_key],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if exists.is_some() {
            continue;
        }
        let Some(day) = template.month_day else { continue };
        let Some(deadline) = month_deadline(today, day) else { continue };

        let description = format!("{} - {}", template.name, today.format("%m/%Y"));
        tx.execute(
            "INSERT INTO task_instances \
             (project_id, template_id, description, offset_days, deadline, class, basis, \
              anchor_date, blocked, alert_status, recurrence, month_key, confirmation) \
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, 0, 'pending', 'monthly', ?8, ?9)",
            params![
                project.id,
                template.id,
                description,
                deadline.format("%Y-%m-%d").to_string(),
                template.class.as_str(),
                template.basis.as_str(),
                anchor_date.map(|d| d.format("%Y-%m-%d").to_string()),
                month_key,
                template.confirmation as i64,
            ],
        )
        .map_err(db_err)?;
        created += 1;
    }

    if created > 0 {
        tracing::info!(
            "📅 Generated {created} recurring task(s) for project {} ({month_key})",
            project.id
        );
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AgendaDb;
    use crate::tasks::{ProjectDraft, Recurrence};

    fn test_db(name: &str) -> (AgendaDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("agendaworks-rec-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (AgendaDb::open(&dir.join("agenda.db")).unwrap(), dir)
    }

    fn seed_project(db: &AgendaDb, today: NaiveDate, draft: ProjectDraft) -> i64 {
        db.create_project(&draft, today).unwrap()
    }

    fn draft(start: Option<&str>) -> ProjectDraft {
        ProjectDraft {
            name: "Branch remodel".into(),
            client: "Acme Bank".into(),
            contract_value: 50_000.0,
            start_date: start.map(str::to_string),
            ..ProjectDraft::default()
        }
    }

    #[test]
    fn test_generates_once_per_month() {
        let (db, dir) = test_db("once");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let project = seed_project(&db, today, draft(Some("2026-03-01")));

        assert_eq!(db.generate_monthly(today).unwrap(), 2);
        // Second run in the same month is a no-op.
        assert_eq!(db.generate_monthly(today).unwrap(), 0);

        let monthly: Vec<_> = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .filter(|t| t.recurrence == Recurrence::Monthly && t.month_key.is_some())
            .collect();
        assert_eq!(monthly.len(), 2);
        assert!(monthly.iter().all(|t| t.month_key.as_deref() == Some("2026-03")));

        let measurement = monthly
            .iter()
            .find(|t| t.description == "MEASUREMENT - 03/2026")
            .unwrap();
        assert_eq!(measurement.deadline, NaiveDate::from_ymd_opt(2026, 3, 20));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_next_month_generates_again() {
        let (db, dir) = test_db("next-month");
        let march = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let april = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let project = seed_project(&db, march, draft(Some("2026-03-01")));

        assert_eq!(db.generate_monthly(march).unwrap(), 2);
        assert_eq!(db.generate_monthly(april).unwrap(), 2);

        let keys: Vec<_> = db
            .checklist(project)
            .unwrap()
            .into_iter()
            .filter_map(|t| t.month_key)
            .collect();
        assert_eq!(keys.iter().filter(|k| *k == "2026-03").count(), 2);
        assert_eq!(keys.iter().filter(|k| *k == "2026-04").count(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_inactive_projects_are_skipped() {
        let (db, dir) = test_db("inactive");
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();

        // Not started yet.
        seed_project(&db, today, draft(Some("2026-06-01")));
        // No start date at all.
        seed_project(&db, today, draft(None));
        // Already handed over.
        let mut done = draft(Some("2026-01-01"));
        done.completion_date = Some("2026-02-28".into());
        seed_project(&db, today, done);

        assert_eq!(db.generate_monthly(today).unwrap(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_day_anchor_clamps_to_short_month() {
        // Day 30 in February lands on the last day instead.
        let feb = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert_eq!(month_deadline(feb, 30), NaiveDate::from_ymd_opt(2026, 2, 28));
        assert_eq!(month_deadline(feb, 10), NaiveDate::from_ymd_opt(2026, 2, 10));

        let leap = NaiveDate::from_ymd_opt(2028, 2, 1).unwrap();
        assert_eq!(month_deadline(leap, 31), NaiveDate::from_ymd_opt(2028, 2, 29));
    }

    #[test]
    fn test_generation_releases_blocked_roots() {
        let (db, dir) = test_db("release-roots");
        // Created before the start date: roots blocked.
        let before = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let project = seed_project(&db, before, draft(Some("2026-03-01")));

        let after = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(db.generate_monthly(after).unwrap(), 2);

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
