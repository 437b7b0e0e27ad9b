//! Pregnancy and breastfeeding safety.

use super::{
    drugs::{self, Drug, IdentifiedMedicine},
    IssueCategory, RegimenInput, Severity, ValidationIssue,
};
use crate::models::ProtocolCategory;

/// Longest gestational age accepted as plausible, in weeks.
const MAX_GESTATIONAL_WEEKS: u32 = 44;
const SECOND_TRIMESTER_FROM_WEEK: u32 = 14;

/// Drugs to avoid early in the first trimester: (drug, before week).
const EARLY_PREGNANCY_CAUTIONS: &[(Drug, u32)] =
    &[(Drug::Efavirenz, 8), (Drug::Dolutegravir, 6)];

pub fn check(input: &RegimenInput, medicines: &[IdentifiedMedicine]) -> Vec<ValidationIssue> {
    let Some(pregnancy) = input.clinical.pregnancy.as_ref() else {
        return Vec::new();
    };

    let mut issues = Vec::new();

    if pregnancy.pregnant {
        let weeks = match pregnancy.gestational_weeks {
            Some(w) if w > MAX_GESTATIONAL_WEEKS => {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::Pregnancy,
                    "implausible_gestational_age",
                    format!("Gestational age of {w} weeks is implausible; trimester checks skipped"),
                ));
                None
            }
            other => other,
        };

        for (drug, before_week) in EARLY_PREGNANCY_CAUTIONS {
            let Some(line) = drugs::find(medicines, *drug) else {
                continue;
            };
            match weeks {
                Some(w) if w < *before_week => issues.push(
                    ValidationIssue::new(
                        Severity::Warning,
                        IssueCategory::Pregnancy,
                        "early_pregnancy_caution",
                        format!(
                            "{drug} before week {before_week} of pregnancy carries a neural tube defect concern (currently week {w})"
                        ),
                    )
                    .with_medicine(line.name.clone()),
                ),
                Some(_) => {}
                None => issues.push(
                    ValidationIssue::new(
                        Severity::Info,
                        IssueCategory::Pregnancy,
                        "gestational_age_unknown",
                        format!("Confirm gestational age: {drug} is cautioned before week {before_week}"),
                    )
                    .with_medicine(line.name.clone()),
                ),
            }
        }

        if let Some(line) = drugs::find(medicines, Drug::Cobicistat) {
            if weeks.is_some_and(|w| w >= SECOND_TRIMESTER_FROM_WEEK) {
                issues.push(
                    ValidationIssue::new(
                        Severity::Critical,
                        IssueCategory::Pregnancy,
                        "cobicistat_later_pregnancy",
                        "Cobicistat-boosted regimens reach inadequate levels in the second and third trimester",
                    )
                    .with_medicine(line.name.clone()),
                );
            }
        }

        let has_didanosine = drugs::contains(medicines, Drug::Didanosine);
        let stavudine = drugs::find(medicines, Drug::Stavudine);
        if has_didanosine && stavudine.is_some() {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                IssueCategory::Pregnancy,
                "didanosine_stavudine",
                "Didanosine with stavudine causes fatal lactic acidosis in pregnancy",
            ));
        } else if let Some(line) = stavudine {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::Pregnancy,
                    "stavudine_in_pregnancy",
                    "Stavudine is not recommended in pregnancy because of mitochondrial toxicity",
                )
                .with_medicine(line.name.clone()),
            );
        }

        if input.category != Some(ProtocolCategory::Pmtct) {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::Pregnancy,
                "consider_pmtct",
                "Patient is pregnant: consider a PMTCT protocol and infant prophylaxis planning",
            ));
        }
    }

    if pregnancy.breastfeeding {
        issues.push(ValidationIssue::new(
            Severity::Info,
            IssueCategory::Pregnancy,
            "breastfeeding",
            "Patient is breastfeeding: keep viral load suppressed and plan infant testing",
        ));
    }

    issues
}
