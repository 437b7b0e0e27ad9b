//! Continuity of care against the patient's other treatments.

use super::{IssueCategory, RegimenInput, Severity, ValidationIssue};
use chrono::NaiveDate;

const GAP_INFO_FROM_DAYS: i64 = 8;
const GAP_WARNING_AFTER_DAYS: i64 = 30;

fn overlaps(a_start: NaiveDate, a_end: Option<NaiveDate>, b_start: NaiveDate, b_end: Option<NaiveDate>) -> bool {
    let a_end = a_end.unwrap_or(NaiveDate::MAX);
    let b_end = b_end.unwrap_or(NaiveDate::MAX);
    a_start <= b_end && b_start <= a_end
}

pub fn check(input: &RegimenInput) -> Vec<ValidationIssue> {
    let today = input.today();
    let others = input
        .history
        .iter()
        .filter(|t| Some(t.id) != input.treatment_id);

    let mut issues = Vec::new();
    let mut previous_end: Option<NaiveDate> = None;

    for other in others {
        if other.is_open_on(today)
            && overlaps(other.start_date, other.end_date, input.start_date, input.end_date)
        {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Continuity,
                "overlapping_treatment",
                format!(
                    "Overlaps open treatment {} started {}",
                    other.id, other.start_date
                ),
            ));
        }
        if let Some(end) = other.end_date.filter(|end| *end < input.start_date) {
            previous_end = previous_end.max(Some(end));
        }
    }

    if let Some(end) = previous_end {
        let gap = (input.start_date - end).num_days();
        if gap > GAP_WARNING_AFTER_DAYS {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Continuity,
                "treatment_gap",
                format!("{gap} days without treatment since {end}; reassess before restarting"),
            ));
        } else if gap >= GAP_INFO_FROM_DAYS {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::Continuity,
                "short_treatment_gap",
                format!("{gap} days without treatment since {end}"),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::super::test_support::input;
    use super::*;
    use crate::models::{PatientTreatment, TreatmentStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn past(start: NaiveDate, end: Option<NaiveDate>, status: TreatmentStatus) -> PatientTreatment {
        PatientTreatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            doctor_id: Uuid::nil(),
            protocol_id: None,
            custom_medications: None,
            start_date: start,
            end_date: end,
            total_cost: Decimal::ZERO,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_overlap_is_critical() {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.history = vec![past(date(5, 1), None, TreatmentStatus::Active)];
        let issues = check(&i);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn validated_treatment_is_excluded() {
        let mut i = input(&["TDF/3TC/DTG"]);
        let existing = past(date(5, 1), None, TreatmentStatus::Active);
        i.treatment_id = Some(existing.id);
        i.history = vec![existing];
        assert!(check(&i).is_empty());
    }

    #[test]
    fn gap_bands() {
        // start date in the fixture is 2024-06-10
        let mut i = input(&["TDF/3TC/DTG"]);
        i.history = vec![past(date(6, 5), Some(date(6, 5)), TreatmentStatus::Completed)];
        assert!(check(&i).is_empty());

        i.history = vec![past(date(4, 1), Some(date(5, 20)), TreatmentStatus::Completed)];
        assert_eq!(check(&i)[0].code, "short_treatment_gap");

        i.history = vec![past(date(1, 1), Some(date(3, 1)), TreatmentStatus::Stopped)];
        let issues = check(&i);
        assert_eq!(issues[0].code, "treatment_gap");
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn latest_ended_treatment_defines_the_gap() {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.history = vec![
            past(date(1, 1), Some(date(2, 1)), TreatmentStatus::Completed),
            past(date(2, 2), Some(date(6, 6)), TreatmentStatus::Completed),
        ];
        assert!(check(&i).is_empty());
    }
}
