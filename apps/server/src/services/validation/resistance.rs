//! Genotypic resistance and virologic response.

use super::{
    drugs::{self, Drug, IdentifiedMedicine},
    IssueCategory, RegimenInput, Severity, ValidationIssue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    High,
    Intermediate,
    Low,
}

impl Level {
    fn severity(self) -> Severity {
        match self {
            Level::High => Severity::Critical,
            Level::Intermediate => Severity::Warning,
            Level::Low => Severity::Info,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Intermediate => "intermediate",
            Level::Low => "low",
        }
    }
}

struct MutationRule {
    mutations: &'static [&'static str],
    effects: &'static [(Drug, Level)],
}

const MUTATIONS: &[MutationRule] = &[
    MutationRule {
        mutations: &["K103N"],
        effects: &[(Drug::Efavirenz, Level::High), (Drug::Nevirapine, Level::High)],
    },
    MutationRule {
        mutations: &["Y181C"],
        effects: &[
            (Drug::Nevirapine, Level::High),
            (Drug::Efavirenz, Level::Intermediate),
            (Drug::Etravirine, Level::Intermediate),
            (Drug::Rilpivirine, Level::Intermediate),
        ],
    },
    MutationRule {
        mutations: &["M184V", "M184I"],
        effects: &[
            (Drug::Lamivudine, Level::High),
            (Drug::Emtricitabine, Level::High),
            (Drug::Abacavir, Level::Low),
        ],
    },
    MutationRule {
        mutations: &["K65R"],
        effects: &[
            (Drug::TenofovirDisoproxil, Level::Intermediate),
            (Drug::TenofovirAlafenamide, Level::Intermediate),
            (Drug::Abacavir, Level::Intermediate),
            (Drug::Didanosine, Level::Intermediate),
            (Drug::Stavudine, Level::Intermediate),
            (Drug::Lamivudine, Level::Low),
            (Drug::Emtricitabine, Level::Low),
        ],
    },
    MutationRule {
        mutations: &["T215Y", "T215F"],
        effects: &[
            (Drug::Zidovudine, Level::High),
            (Drug::Stavudine, Level::High),
            (Drug::Abacavir, Level::Low),
            (Drug::TenofovirDisoproxil, Level::Low),
        ],
    },
    MutationRule {
        mutations: &["Q148H", "Q148K", "Q148R"],
        effects: &[
            (Drug::Raltegravir, Level::High),
            (Drug::Elvitegravir, Level::High),
            (Drug::Dolutegravir, Level::Intermediate),
            (Drug::Bictegravir, Level::Intermediate),
            (Drug::Cabotegravir, Level::Intermediate),
        ],
    },
    MutationRule {
        mutations: &["N155H"],
        effects: &[
            (Drug::Raltegravir, Level::High),
            (Drug::Elvitegravir, Level::High),
            (Drug::Dolutegravir, Level::Low),
        ],
    },
    MutationRule {
        mutations: &["I50L"],
        effects: &[(Drug::Atazanavir, Level::High)],
    },
];

/// Copies/mL at or above which an established regimen is failing.
const VIROLOGIC_FAILURE_COPIES: u64 = 1000;
const LOW_LEVEL_VIREMIA_COPIES: u64 = 200;
const MONTHS_BEFORE_FAILURE_ASSESSMENT: u32 = 6;

/// Expand `M184V/I` shorthand into `M184V` and `M184I`.
fn expand_mutation(raw: &str) -> Vec<String> {
    let upper = raw.trim().to_uppercase();
    let mut parts = upper.split('/');
    let Some(first) = parts.next().filter(|p| !p.is_empty()) else {
        return Vec::new();
    };
    let stem: String = first.trim_end_matches(|c: char| c.is_ascii_alphabetic()).to_string();
    let mut expanded = vec![first.to_string()];
    for variant in parts.filter(|p| !p.is_empty()) {
        if variant.chars().all(|c| c.is_ascii_alphabetic()) && variant.len() == 1 {
            expanded.push(format!("{stem}{variant}"));
        } else {
            expanded.push(variant.to_string());
        }
    }
    expanded
}

pub fn check(input: &RegimenInput, medicines: &[IdentifiedMedicine]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut reported: Vec<String> = Vec::new();
    for mutation in input
        .clinical
        .resistance_mutations
        .iter()
        .flat_map(|m| expand_mutation(m))
    {
        if reported.contains(&mutation) {
            continue;
        }
        reported.push(mutation.clone());

        let Some(rule) = MUTATIONS
            .iter()
            .find(|r| r.mutations.contains(&mutation.as_str()))
        else {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::Resistance,
                "unrecognised_mutation",
                format!("Mutation {mutation} is not in the resistance table; review manually"),
            ));
            continue;
        };

        for (drug, level) in rule.effects {
            if let Some(line) = drugs::find(medicines, *drug) {
                issues.push(
                    ValidationIssue::new(
                        level.severity(),
                        IssueCategory::Resistance,
                        "drug_resistance",
                        format!(
                            "{mutation} confers {}-level resistance to {drug}",
                            level.as_str()
                        ),
                    )
                    .with_medicine(line.name.clone()),
                );
            }
        }
    }

    if let Some(viral_load) = input.clinical.viral_load {
        let established = input
            .clinical
            .months_on_current_regimen
            .is_some_and(|m| m >= MONTHS_BEFORE_FAILURE_ASSESSMENT);
        if viral_load >= VIROLOGIC_FAILURE_COPIES && established {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Resistance,
                "virologic_failure",
                format!(
                    "Viral load {viral_load} copies/mL after {MONTHS_BEFORE_FAILURE_ASSESSMENT}+ months suggests virologic failure; order resistance testing"
                ),
            ));
        } else if viral_load >= LOW_LEVEL_VIREMIA_COPIES {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::Resistance,
                "low_level_viremia",
                format!("Viral load {viral_load} copies/mL is detectable; repeat after adherence review"),
            ));
        }
    }

    issues
}
