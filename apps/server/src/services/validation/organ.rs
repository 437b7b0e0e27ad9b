//! Renal and hepatic dosing rules.

use super::{
    drugs::{self, Drug, IdentifiedMedicine},
    IssueCategory, RegimenInput, Severity, ValidationIssue,
};
use crate::models::clinical::ChildPugh;

/// Creatinine clearance thresholds in mL/min.
struct RenalRule {
    drug: Drug,
    adjust_below: Option<f64>,
    avoid_below: Option<f64>,
}

const RENAL_RULES: &[RenalRule] = &[
    RenalRule { drug: Drug::TenofovirDisoproxil, adjust_below: Some(50.0), avoid_below: Some(30.0) },
    RenalRule { drug: Drug::TenofovirAlafenamide, adjust_below: None, avoid_below: Some(15.0) },
    RenalRule { drug: Drug::Lamivudine, adjust_below: Some(50.0), avoid_below: None },
    RenalRule { drug: Drug::Emtricitabine, adjust_below: Some(50.0), avoid_below: None },
    RenalRule { drug: Drug::Zidovudine, adjust_below: Some(15.0), avoid_below: None },
    RenalRule { drug: Drug::Didanosine, adjust_below: Some(60.0), avoid_below: None },
    RenalRule { drug: Drug::Stavudine, adjust_below: Some(50.0), avoid_below: None },
    RenalRule { drug: Drug::Cobicistat, adjust_below: None, avoid_below: Some(30.0) },
];

struct HepaticRule {
    drug: Drug,
    caution_from: Option<ChildPugh>,
    avoid_from: Option<ChildPugh>,
    /// ALT multiple of the upper limit of normal at or above which the drug is avoided.
    alt_limit: Option<f64>,
}

const HEPATIC_RULES: &[HepaticRule] = &[
    HepaticRule { drug: Drug::Nevirapine, caution_from: None, avoid_from: Some(ChildPugh::B), alt_limit: Some(5.0) },
    HepaticRule { drug: Drug::Efavirenz, caution_from: Some(ChildPugh::B), avoid_from: Some(ChildPugh::C), alt_limit: Some(5.0) },
    HepaticRule { drug: Drug::Abacavir, caution_from: Some(ChildPugh::A), avoid_from: Some(ChildPugh::B), alt_limit: None },
    HepaticRule { drug: Drug::Atazanavir, caution_from: Some(ChildPugh::B), avoid_from: Some(ChildPugh::C), alt_limit: None },
    HepaticRule { drug: Drug::Darunavir, caution_from: Some(ChildPugh::B), avoid_from: Some(ChildPugh::C), alt_limit: None },
    HepaticRule { drug: Drug::Lopinavir, caution_from: Some(ChildPugh::B), avoid_from: None, alt_limit: None },
    HepaticRule { drug: Drug::Dolutegravir, caution_from: None, avoid_from: Some(ChildPugh::C), alt_limit: None },
    HepaticRule { drug: Drug::Didanosine, caution_from: Some(ChildPugh::B), avoid_from: None, alt_limit: Some(5.0) },
    HepaticRule { drug: Drug::Stavudine, caution_from: Some(ChildPugh::B), avoid_from: None, alt_limit: Some(5.0) },
];

pub fn check_renal(input: &RegimenInput, medicines: &[IdentifiedMedicine]) -> Vec<ValidationIssue> {
    let Some(clearance) = input
        .clinical
        .renal
        .as_ref()
        .and_then(|r| r.creatinine_clearance)
    else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for rule in RENAL_RULES {
        let Some(line) = drugs::find(medicines, rule.drug) else {
            continue;
        };
        if rule.avoid_below.is_some_and(|limit| clearance < limit) {
            issues.push(
                ValidationIssue::new(
                    Severity::Critical,
                    IssueCategory::RenalFunction,
                    "renal_avoid",
                    format!(
                        "{} should be avoided at creatinine clearance {clearance:.0} mL/min (below {:.0})",
                        rule.drug,
                        rule.avoid_below.unwrap_or_default()
                    ),
                )
                .with_medicine(line.name.clone()),
            );
        } else if rule.adjust_below.is_some_and(|limit| clearance < limit) {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::RenalFunction,
                    "renal_dose_adjustment",
                    format!(
                        "{} needs a dose adjustment at creatinine clearance {clearance:.0} mL/min (below {:.0})",
                        rule.drug,
                        rule.adjust_below.unwrap_or_default()
                    ),
                )
                .with_medicine(line.name.clone()),
            );
        }
    }
    issues
}

pub fn check_hepatic(input: &RegimenInput, medicines: &[IdentifiedMedicine]) -> Vec<ValidationIssue> {
    let Some(hepatic) = input.clinical.hepatic.as_ref() else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for rule in HEPATIC_RULES {
        let Some(line) = drugs::find(medicines, rule.drug) else {
            continue;
        };

        let alt_exceeded = match (rule.alt_limit, hepatic.alt_uln_ratio) {
            (Some(limit), Some(alt)) if alt >= limit => Some((alt, limit)),
            _ => None,
        };
        if let Some((alt, limit)) = alt_exceeded {
            issues.push(
                ValidationIssue::new(
                    Severity::Critical,
                    IssueCategory::HepaticFunction,
                    "hepatic_alt_limit",
                    format!(
                        "{} should be avoided with ALT at {alt:.1}x the upper limit of normal (limit {limit:.0}x)",
                        rule.drug
                    ),
                )
                .with_medicine(line.name.clone()),
            );
            continue;
        }

        let Some(class) = hepatic.child_pugh else {
            continue;
        };
        if rule.avoid_from.is_some_and(|from| class.at_least(from)) {
            issues.push(
                ValidationIssue::new(
                    Severity::Critical,
                    IssueCategory::HepaticFunction,
                    "hepatic_avoid",
                    format!(
                        "{} is not recommended in Child-Pugh class {}",
                        rule.drug,
                        class.as_str().to_uppercase()
                    ),
                )
                .with_medicine(line.name.clone()),
            );
        } else if rule.caution_from.is_some_and(|from| class.at_least(from)) {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::HepaticFunction,
                    "hepatic_caution",
                    format!(
                        "{} requires caution and liver monitoring in Child-Pugh class {}",
                        rule.drug,
                        class.as_str().to_uppercase()
                    ),
                )
                .with_medicine(line.name.clone()),
            );
        }
    }
    issues
}
