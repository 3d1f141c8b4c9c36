//! Default task-template catalog.
//!
//! Fixed, ordered set seeded into the store on first open. Read-only at
//! runtime; corrective changes go through a schema migration.

use crate::tasks::{CriticalDate, DeadlineBasis, EscalationClass, Recurrence};

/// One catalog entry before it gets a row id. Prerequisites reference
/// the *sequence* of another seed and are resolved to row ids while
/// seeding, in ascending sequence order.
pub struct TemplateSeed {
    pub name: &'static str,
    pub sequence: i64,
    pub offset_days: i64,
    pub class: EscalationClass,
    pub basis: DeadlineBasis,
    pub prerequisite_seq: Option<i64>,
    pub recurrence: Recurrence,
    pub month_day: Option<u32>,
    pub trigger: Option<CriticalDate>,
    pub confirmation: bool,
}

const fn one_off(
    name: &'static str,
    sequence: i64,
    offset_days: i64,
    class: EscalationClass,
    basis: DeadlineBasis,
    prerequisite_seq: Option<i64>,
    trigger: Option<CriticalDate>,
) -> TemplateSeed {
    TemplateSeed {
        name,
        sequence,
        offset_days,
        class,
        basis,
        prerequisite_seq,
        recurrence: Recurrence::OneOff,
        month_day: None,
        trigger,
        confirmation: false,
    }
}

const fn monthly(
    name: &'static str,
    sequence: i64,
    class: EscalationClass,
    month_day: u32,
    confirmation: bool,
) -> TemplateSeed {
    TemplateSeed {
        name,
        sequence,
        offset_days: 0,
        class,
        basis: DeadlineBasis::Start,
        prerequisite_seq: None,
        recurrence: Recurrence::Monthly,
        month_day: Some(month_day),
        trigger: None,
        confirmation,
    }
}

use DeadlineBasis::{Authorization, Creation, PrerequisiteCompletion, Signature, Start};
use EscalationClass::{A, B};

/// The 18-task default checklist.
pub const DEFAULT_TEMPLATES: &[TemplateSeed] = &[
    // Initial flow
    one_off("PROJECT AND BUDGET RETURN", 1, 2, A, Creation, None, None),
    one_off("REVIEW", 2, 3, B, PrerequisiteCompletion, Some(1), None),
    one_off("MANAGER REVIEW", 3, 2, B, PrerequisiteCompletion, Some(2), None),
    // After manager review
    one_off("INQUIRY FOLLOW-UP", 4, 2, A, PrerequisiteCompletion, Some(3), None),
    one_off(
        "CONTRACT SIGNED",
        5,
        5,
        B,
        PrerequisiteCompletion,
        Some(3),
        Some(CriticalDate::Signature),
    ),
    // Unlocked by the signature date
    one_off(
        "REQUEST AUTHORIZATION DATE",
        6,
        1,
        A,
        Signature,
        None,
        Some(CriticalDate::Authorization),
    ),
    one_off("ABC MATERIAL ORDER", 7, 8, B, Signature, None, None),
    one_off("TECHNICAL LIABILITY PERMIT", 8, 5, B, Signature, None, None),
    one_off("INSURANCE REQUEST", 9, 5, B, Signature, None, None),
    one_off("INSURANCE ACCEPTANCE", 10, 5, B, Signature, None, None),
    one_off("INSURANCE PAYMENT", 11, 5, B, Signature, None, None),
    one_off("INSURANCE AND PERMIT SUBMISSION", 12, 5, B, Signature, None, None),
    // Unlocked by the authorization date
    one_off("WORK SCHEDULE", 13, 0, B, Authorization, None, None),
    one_off("PROGRESS REPORT", 14, 5, B, Authorization, None, None),
    // Lead-time tasks due before the project start
    one_off("STAFF HIRING", 15, -15, B, Start, None, None),
    one_off("ACCESS REQUEST", 16, -10, B, Start, None, None),
    // Monthly recurring tasks
    monthly("MEASUREMENT", 17, B, 20, false),
    monthly("MEASUREMENT CONFIRMATION", 18, A, 10, true),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        assert_eq!(DEFAULT_TEMPLATES.len(), 18);
        // Sequences are unique and ascending.
        let mut prev = 0;
        for seed in DEFAULT_TEMPLATES {
            assert!(seed.sequence > prev);
            prev = seed.sequence;
        }
    }

    #[test]
    fn test_prerequisites_point_backwards() {
        // Prerequisites must reference an earlier sequence so a single
        // in-order seeding pass can resolve them.
        for seed in DEFAULT_TEMPLATES {
            if let Some(dep) = seed.prerequisite_seq {
                assert!(dep < seed.sequence, "{} depends forward", seed.name);
                assert_eq!(seed.basis, DeadlineBasis::PrerequisiteCompletion);
            }
        }
    }

    #[test]
    fn test_monthly_templates_have_day_anchor() {
        for seed in DEFAULT_TEMPLATES {
            match seed.recurrence {
                Recurrence::Monthly => assert!(seed.month_day.is_some()),
                Recurrence::OneOff => assert!(seed.month_day.is_none()),
            }
        }
    }
}
