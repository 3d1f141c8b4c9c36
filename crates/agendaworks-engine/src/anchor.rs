//! Anchor resolver: maps a deadline basis to a concrete reference date
//! on the current project record.
//!
//! Bad data blocks rather than crashes: a present-but-malformed date
//! resolves to "unavailable", which leaves the task blocked.

use chrono::NaiveDate;

use crate::tasks::{DeadlineBasis, Project};

/// Parse a calendar date from stored TEXT. Tolerates a trailing
/// `HH:MM:SS` (creation timestamps) and surrounding whitespace.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Resolve the anchor date for `basis` on `project`, or None when the
/// reference date is missing or unparseable.
///
/// PrerequisiteCompletion is not a project-level anchor; the dependency
/// propagator resolves it from the prerequisite instance, so it is
/// always unavailable here.
pub fn resolve(project: &Project, basis: DeadlineBasis) -> Option<NaiveDate> {
    let raw = match basis {
        DeadlineBasis::Creation => Some(project.created_at.as_str()),
        DeadlineBasis::Start => project.start_date.as_deref(),
        DeadlineBasis::Signature => project.signature_date.as_deref(),
        DeadlineBasis::Authorization => project.authorization_date.as_deref(),
        DeadlineBasis::PrerequisiteCompletion => None,
    }?;
    parse_date(raw)
}

/// Whether the project has effectively started: start date present,
/// valid, and not in the future.
pub fn has_started(project: &Project, today: NaiveDate) -> bool {
    project
        .start_date
        .as_deref()
        .and_then(parse_date)
        .is_some_and(|start| start <= today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::ProjectStatus;

    fn project() -> Project {
        Project {
            id: 1,
            name: "Branch remodel".into(),
            client: "Acme Bank".into(),
            contract_value: 120_000.0,
            start_date: Some("2026-03-01".into()),
            status: ProjectStatus::InProgress,
            created_at: "2026-02-10 14:32:05".into(),
            contract_number: None,
            agency_prefix: None,
            service: None,
            partner_value: None,
            percentage: None,
            total_value: None,
            execution_month: None,
            execution_year: None,
            completion_date: None,
            signature_date: None,
            authorization_date: Some("bogus-date".into()),
        }
    }

    #[test]
    fn test_creation_from_timestamp() {
        let p = project();
        assert_eq!(
            resolve(&p, DeadlineBasis::Creation),
            NaiveDate::from_ymd_opt(2026, 2, 10)
        );
    }

    #[test]
    fn test_missing_and_malformed_are_unavailable() {
        let p = project();
        assert_eq!(resolve(&p, DeadlineBasis::Signature), None);
        assert_eq!(resolve(&p, DeadlineBasis::Authorization), None);
        assert_eq!(resolve(&p, DeadlineBasis::PrerequisiteCompletion), None);
    }

    #[test]
    fn test_start_resolves() {
        let p = project();
        assert_eq!(
            resolve(&p, DeadlineBasis::Start),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
    }

    #[test]
    fn test_has_started() {
        let p = project();
        let before = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(!has_started(&p, before));
        assert!(has_started(&p, after));

        let mut unstarted = p.clone();
        unstarted.start_date = None;
        assert!(!has_started(&unstarted, after));
    }
}
