//! Regimen composition: something to take, nothing taken twice.

use super::{drugs::IdentifiedMedicine, IssueCategory, RegimenInput, Severity, ValidationIssue};
use std::collections::HashMap;

pub fn check(input: &RegimenInput, medicines: &[IdentifiedMedicine]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if input.medicines.iter().all(|m| m.trim().is_empty()) {
        issues.push(ValidationIssue::new(
            Severity::Critical,
            IssueCategory::Regimen,
            "empty_regimen",
            "The regimen contains no medicines",
        ));
        return issues;
    }

    let mut seen_names: HashMap<String, usize> = HashMap::new();
    for name in &input.medicines {
        *seen_names.entry(name.trim().to_lowercase()).or_default() += 1;
    }
    let mut duplicate_names: Vec<_> = seen_names
        .into_iter()
        .filter(|(name, count)| *count > 1 && !name.is_empty())
        .map(|(name, _)| name)
        .collect();
    duplicate_names.sort();
    for name in &duplicate_names {
        issues.push(
            ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Regimen,
                "duplicate_medicine",
                format!("'{name}' appears more than once in the regimen"),
            )
            .with_medicine(name.clone()),
        );
    }

    // Same active ingredient via different products, e.g. TDF/3TC plus 3TC.
    let mut lines_per_drug: HashMap<_, Vec<&str>> = HashMap::new();
    for medicine in medicines {
        if duplicate_names.contains(&medicine.name.trim().to_lowercase()) {
            continue;
        }
        for drug in &medicine.drugs {
            lines_per_drug.entry(*drug).or_default().push(&medicine.name);
        }
    }
    let mut overlapping: Vec<_> = lines_per_drug
        .into_iter()
        .filter(|(_, lines)| lines.len() > 1)
        .collect();
    overlapping.sort_by_key(|(drug, _)| *drug);
    for (drug, lines) in overlapping {
        issues.push(
            ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Regimen,
                "duplicate_drug",
                format!("{drug} is supplied by several lines: {}", lines.join(", ")),
            )
            .with_medicine(drug.display_name()),
        );
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::super::{drugs::identify_all, test_support::input};
    use super::*;

    fn run(names: &[&str]) -> Vec<ValidationIssue> {
        let i = input(names);
        check(&i, &identify_all(&i.medicines))
    }

    #[test]
    fn empty_regimen_is_critical() {
        let issues = run(&[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].code, "empty_regimen");
    }

    #[test]
    fn duplicate_names_warn_once() {
        let issues = run(&["Dolutegravir", "dolutegravir ", "Lamivudine"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "duplicate_medicine");
    }

    #[test]
    fn overlapping_combination_products_warn() {
        let issues = run(&["TDF/3TC", "Lamivudine", "Dolutegravir"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "duplicate_drug");
        assert_eq!(issues[0].medicine.as_deref(), Some("lamivudine"));
    }
}
