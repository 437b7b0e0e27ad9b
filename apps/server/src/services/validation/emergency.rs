//! Timing rules for post- and pre-exposure prophylaxis.

use super::{IssueCategory, RegimenInput, Severity, ValidationIssue};
use crate::models::ProtocolCategory;
use chrono::{DateTime, NaiveTime, Utc};

const PEP_OPTIMAL_HOURS: f64 = 2.0;
const PEP_LATEST_HOURS: f64 = 72.0;
const PEP_COURSE_DAYS: i64 = 28;
const PREP_TEST_VALID_DAYS: i64 = 7;

/// Hours from exposure to the start of the regimen, or `None` when the
/// exposure comes after the start.
///
/// A regimen starting today starts now. On any other date only the day is
/// known, so an exposure earlier that same day counts as zero hours.
fn hours_to_start(input: &RegimenInput, exposure: DateTime<Utc>) -> Option<f64> {
    let minutes = if input.start_date == input.today() {
        if exposure > input.now {
            return None;
        }
        (input.now - exposure).num_minutes()
    } else {
        if exposure.date_naive() > input.start_date {
            return None;
        }
        let midnight = input.start_date.and_time(NaiveTime::MIN).and_utc();
        (midnight - exposure).num_minutes().max(0)
    };
    Some(minutes as f64 / 60.0)
}

pub fn check(input: &RegimenInput) -> Vec<ValidationIssue> {
    match input.category {
        Some(ProtocolCategory::Pep) => check_pep(input),
        Some(ProtocolCategory::Prep) => check_prep(input),
        _ => Vec::new(),
    }
}

fn check_pep(input: &RegimenInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    match input.clinical.exposure_at {
        None => issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::EmergencyTiming,
            "pep_exposure_time_missing",
            "Exposure time not recorded; PEP timing cannot be verified",
        )),
        Some(exposure) => match hours_to_start(input, exposure) {
            None => issues.push(ValidationIssue::new(
                Severity::Critical,
                IssueCategory::EmergencyTiming,
                "pep_exposure_after_start",
                format!(
                    "Exposure at {exposure} is after the treatment start on {}",
                    input.start_date
                ),
            )),
            Some(hours) if hours > PEP_LATEST_HOURS => {
                issues.push(ValidationIssue::new(
                    Severity::Critical,
                    IssueCategory::EmergencyTiming,
                    "pep_window_missed",
                    format!(
                        "PEP started {hours:.1} h after exposure, beyond the {PEP_LATEST_HOURS:.0} h window"
                    ),
                ));
            }
            Some(hours) if hours > PEP_OPTIMAL_HOURS => issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::EmergencyTiming,
                "pep_started_within_window",
                format!("PEP started {hours:.1} h after exposure (acceptable within {PEP_LATEST_HOURS:.0} h)"),
            )),
            Some(hours) => issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::EmergencyTiming,
                "pep_started_optimally",
                format!("PEP started {hours:.1} h after exposure"),
            )),
        },
    }

    if let Some(days) = input.planned_days.filter(|d| *d != PEP_COURSE_DAYS) {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::EmergencyTiming,
            "pep_duration",
            format!("PEP is planned for {days} days; the standard course is {PEP_COURSE_DAYS} days"),
        ));
    }

    issues
}

fn check_prep(input: &RegimenInput) -> Vec<ValidationIssue> {
    let recent_negative = input
        .clinical
        .last_negative_hiv_test
        .map(|tested| (input.start_date - tested).num_days())
        .is_some_and(|age| (0..=PREP_TEST_VALID_DAYS).contains(&age));
    if recent_negative {
        return Vec::new();
    }
    vec![ValidationIssue::new(
        Severity::Warning,
        IssueCategory::EmergencyTiming,
        "prep_requires_negative_test",
        format!("PrEP requires a negative HIV test within {PREP_TEST_VALID_DAYS} days before starting"),
    )]
}

#[cfg(test)]
mod tests {
    use super::super::test_support::input;
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn pep(exposure_hours_before_now: Option<i64>, planned_days: Option<i64>) -> Vec<ValidationIssue> {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.category = Some(ProtocolCategory::Pep);
        i.planned_days = planned_days;
        i.clinical.exposure_at = exposure_hours_before_now.map(|h| i.now - Duration::hours(h));
        check(&i)
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn pep_windows() {
        assert_eq!(codes(&pep(Some(1), Some(28))), vec!["pep_started_optimally"]);
        assert_eq!(codes(&pep(Some(30), Some(28))), vec!["pep_started_within_window"]);
        let late = pep(Some(80), Some(28));
        assert_eq!(late[0].severity, Severity::Critical);
        assert_eq!(late[0].code, "pep_window_missed");
    }

    #[test]
    fn pep_missing_exposure_and_duration() {
        let issues = pep(None, Some(30));
        assert_eq!(
            codes(&issues),
            vec!["pep_exposure_time_missing", "pep_duration"]
        );
    }

    #[test]
    fn exposure_after_start_is_critical() {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.category = Some(ProtocolCategory::Pep);
        i.clinical.exposure_at = Some(i.now + Duration::days(2));
        assert_eq!(codes(&check(&i)), vec!["pep_exposure_after_start"]);
    }

    #[test]
    fn later_exposure_on_start_day_is_after_start() {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.category = Some(ProtocolCategory::Pep);
        i.planned_days = Some(28);
        i.clinical.exposure_at = Some(i.now + Duration::hours(6));
        let issues = check(&i);
        assert_eq!(codes(&issues), vec!["pep_exposure_after_start"]);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn past_start_date_measures_from_that_day() {
        let mut i = input(&["TDF/3TC/DTG"]);
        i.category = Some(ProtocolCategory::Pep);
        i.planned_days = Some(28);
        i.start_date = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();

        // earlier on the start day
        i.clinical.exposure_at = Some("2024-06-08T15:00:00Z".parse().unwrap());
        assert_eq!(codes(&check(&i)), vec!["pep_started_optimally"]);

        i.clinical.exposure_at = Some("2024-06-09T01:00:00Z".parse().unwrap());
        assert_eq!(codes(&check(&i)), vec!["pep_exposure_after_start"]);

        i.clinical.exposure_at = Some("2024-06-04T12:00:00Z".parse().unwrap());
        assert_eq!(codes(&check(&i)), vec!["pep_window_missed"]);
    }

    #[test]
    fn prep_needs_recent_negative_test() {
        let mut i = input(&["TDF/FTC"]);
        i.category = Some(ProtocolCategory::Prep);
        assert_eq!(codes(&check(&i)), vec!["prep_requires_negative_test"]);

        i.clinical.last_negative_hiv_test = NaiveDate::from_ymd_opt(2024, 6, 5);
        assert!(check(&i).is_empty());

        i.clinical.last_negative_hiv_test = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(check(&i).len(), 1);
    }

    #[test]
    fn other_categories_skip_timing() {
        let i = input(&["TDF/3TC/DTG"]);
        assert!(check(&i).is_empty());
    }
}
