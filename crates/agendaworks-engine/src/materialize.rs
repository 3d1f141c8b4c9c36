//! Checklist materializer: stamps one task instance per catalog
//! template when a project is created.
//!
//! Runs inside the project-creation transaction so a project never
//! exists with a partial checklist. Two passes: insert every instance
//! in sequence order, then wire prerequisite template ids to the
//! instance ids they resolved to.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rusqlite::{OptionalExtension, Transaction, params};

use agendaworks_core::error::{AgendaError, Result};

use crate::anchor;
use crate::persistence::{db_err, read_project};
use crate::tasks::{DeadlineBasis, Recurrence, TaskTemplate};

fn insert_instance(
    tx: &Transaction<'_>,
    project_id: i64,
    template: &TaskTemplate,
    deadline: Option<NaiveDate>,
    anchor_date: Option<NaiveDate>,
    blocked: bool,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO task_instances \
         (project_id, template_id, description, offset_days, deadline, class, basis, \
          anchor_date, blocked, alert_status, recurrence, confirmation) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?11)",
        params![
            project_id,
            template.id,
            template.name,
            template.offset_days,
            deadline.map(|d| d.format("%Y-%m-%d").to_string()),
            template.class.as_str(),
            template.basis.as_str(),
            anchor_date.map(|d| d.format("%Y-%m-%d").to_string()),
            blocked as i64,
            template.recurrence.as_str(),
            template.confirmation as i64,
        ],
    )
    .map_err(db_err)?;
    Ok(tx.last_insert_rowid())
}

/// Materialize the full checklist for `project_id`.
pub fn build_checklist(
    tx: &Transaction<'_>,
    project_id: i64,
    templates: &[TaskTemplate],
    today: NaiveDate,
) -> Result<()> {
    let project = read_project(tx, project_id)?
        .ok_or_else(|| AgendaError::Store(format!("project {project_id} not found")))?;
    let started = anchor::has_started(&project, today);

    // Pass 1: insert in sequence order, remembering template -> instance.
    let mut instance_of: HashMap<i64, i64> = HashMap::new();
    for template in templates {
        let instance_id = match template.recurrence {
            Recurrence::Monthly => {
                // Recurrence root: undated placeholder the generator
                // stamps monthly copies from. Blocked until the project
                // has actually started.
                let start = anchor::resolve(&project, DeadlineBasis::Start);
                insert_instance(tx, project_id, template, None, start, !started)?
            }
            Recurrence::OneOff => match template.basis {
                DeadlineBasis::PrerequisiteCompletion => {
                    insert_instance(tx, project_id, template, None, None, true)?
                }
                basis => match anchor::resolve(&project, basis) {
                    Some(anchor_date) => {
                        let deadline = anchor_date + Duration::days(template.offset_days);
                        insert_instance(tx, project_id, template, Some(deadline), Some(anchor_date), false)?
                    }
                    // Anchor missing or malformed: blocked, no deadline.
                    None => insert_instance(tx, project_id, template, None, None, true)?,
                },
            },
        };
        instance_of.insert(template.id, instance_id);
    }

    // Pass 2: resolve prerequisite template ids to instance ids.
    for template in templates {
        if template.basis != DeadlineBasis::PrerequisiteCompletion {
            continue;
        }
        let Some(&instance_id) = instance_of.get(&template.id) else {
            continue;
        };
        let Some(dep_template) = template.prerequisite_id else {
            continue;
        };
        let Some(&dep_instance) = instance_of.get(&dep_template) else {
            continue;
        };
        tx.execute(
            "UPDATE task_instances SET prerequisite_id = ?1 WHERE id = ?2",
            params![dep_instance, instance_id],
        )
        .map_err(db_err)?;

        // Prerequisite already completed (re-materialization): unblock
        // with a deadline anchored on its completion date.
        let completed_on: Option<String> = tx
            .query_row(
                "SELECT completed_on FROM task_instances WHERE id = ?1 AND completed = 1",
                params![dep_instance],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?
            .flatten();
        if let Some(done) = completed_on.as_deref().and_then(anchor::parse_date) {
            let deadline = done + Duration::days(template.offset_days);
            tx.execute(
                "UPDATE task_instances SET blocked = 0, deadline = ?1, anchor_date = ?2 \
                 WHERE id = ?3",
                params![
                    deadline.format("%Y-%m-%d").to_string(),
                    done.format("%Y-%m-%d").to_string(),
                    instance_id,
                ],
            )
            .map_err(db_err)?;
        }
    }

    Ok(())
}
