//! Clinical safety validation for treatment regimens
//!
//! Every check is a pure function over a [`RegimenInput`]; [`validate`] runs
//! them all and folds the issues into a [`ValidationReport`]. A report is safe
//! unless at least one issue is critical.

pub mod adherence;
pub mod continuity;
pub mod drugs;
pub mod emergency;
pub mod organ;
pub mod pregnancy;
pub mod regimen;
pub mod resistance;

use crate::models::{ClinicalContext, PatientTreatment, ProtocolCategory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Adherence,
    Continuity,
    Resistance,
    Pregnancy,
    RenalFunction,
    HepaticFunction,
    EmergencyTiming,
    Regimen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    /// Stable machine-readable identifier, e.g. `renal_avoid`.
    pub code: String,
    pub message: String,
    /// Medicine the issue is about, when it concerns one drug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medicine: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code: code.to_string(),
            message: message.into(),
            medicine: None,
        }
    }

    pub fn with_medicine(mut self, medicine: impl Into<String>) -> Self {
        self.medicine = Some(medicine.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_safe: bool,
    pub summary: IssueSummary,
    pub issues: Vec<ValidationIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::from_issues(Vec::new())
    }
}

impl ValidationReport {
    /// Most severe issues first; order within a severity is check order.
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
        let summary = IssueSummary {
            critical: count(Severity::Critical),
            warning: count(Severity::Warning),
            info: count(Severity::Info),
        };
        Self {
            is_safe: summary.critical == 0,
            summary,
            issues,
        }
    }

    pub fn has_critical(&self) -> bool {
        !self.is_safe
    }

    pub fn issues_in(&self, category: IssueCategory) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }
}

/// Everything the checks look at for one proposed or existing regimen.
#[derive(Debug, Clone)]
pub struct RegimenInput {
    /// Treatment being validated, excluded from continuity comparisons.
    pub treatment_id: Option<Uuid>,
    pub category: Option<ProtocolCategory>,
    /// Display names of every medicine in the regimen, protocol and custom.
    pub medicines: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Planned length in days from the treatment span or the protocol.
    pub planned_days: Option<i64>,
    pub clinical: ClinicalContext,
    /// The patient's other treatments.
    pub history: Vec<PatientTreatment>,
    pub now: DateTime<Utc>,
}

impl RegimenInput {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Run every check and build the combined report.
pub fn validate(input: &RegimenInput) -> ValidationReport {
    let drugs = drugs::identify_all(&input.medicines);

    let mut issues = Vec::new();
    issues.extend(regimen::check(input, &drugs));
    issues.extend(organ::check_renal(input, &drugs));
    issues.extend(organ::check_hepatic(input, &drugs));
    issues.extend(pregnancy::check(input, &drugs));
    issues.extend(resistance::check(input, &drugs));
    issues.extend(adherence::check(input));
    issues.extend(continuity::check(input));
    issues.extend(emergency::check(input));

    let report = ValidationReport::from_issues(issues);
    tracing::debug!(
        critical = report.summary.critical,
        warning = report.summary.warning,
        info = report.summary.info,
        "Regimen validated"
    );
    report
}
