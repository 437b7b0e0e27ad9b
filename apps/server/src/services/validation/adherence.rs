//! Adherence from dose counts and missed-day streaks.

use super::{IssueCategory, RegimenInput, Severity, ValidationIssue};

const GOOD_ADHERENCE_PERCENT: f64 = 95.0;
const MODERATE_ADHERENCE_PERCENT: f64 = 85.0;
const MISSED_DAYS_WARNING: u32 = 2;
const MISSED_DAYS_CRITICAL: u32 = 7;

/// Percentage of prescribed doses taken, when the counts are consistent.
pub fn adherence_rate(prescribed: u32, taken: u32) -> Option<f64> {
    if prescribed == 0 || taken > prescribed {
        return None;
    }
    Some(f64::from(taken) / f64::from(prescribed) * 100.0)
}

pub fn check(input: &RegimenInput) -> Vec<ValidationIssue> {
    let Some(record) = input.clinical.adherence.as_ref() else {
        return Vec::new();
    };
    let mut issues = Vec::new();

    if record.doses_taken > record.doses_prescribed {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Adherence,
            "inconsistent_adherence_data",
            format!(
                "{} doses taken exceeds the {} prescribed; check the adherence record",
                record.doses_taken, record.doses_prescribed
            ),
        ));
    } else if let Some(rate) = adherence_rate(record.doses_prescribed, record.doses_taken) {
        if rate < MODERATE_ADHERENCE_PERCENT {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Adherence,
                "poor_adherence",
                format!("Adherence {rate:.1}% is poor (below {MODERATE_ADHERENCE_PERCENT:.0}%); resistance risk is high"),
            ));
        } else if rate < GOOD_ADHERENCE_PERCENT {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Adherence,
                "moderate_adherence",
                format!("Adherence {rate:.1}% is below the {GOOD_ADHERENCE_PERCENT:.0}% target"),
            ));
        }
    }

    let missed = record.consecutive_missed_days;
    if missed >= MISSED_DAYS_CRITICAL {
        issues.push(ValidationIssue::new(
            Severity::Critical,
            IssueCategory::Adherence,
            "treatment_interruption",
            format!("{missed} consecutive days missed amounts to a treatment interruption"),
        ));
    } else if missed >= MISSED_DAYS_WARNING {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Adherence,
            "missed_doses",
            format!("{missed} consecutive days missed"),
        ));
    }

    issues
}
