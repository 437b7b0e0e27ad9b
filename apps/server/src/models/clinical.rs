//! Patient clinical context consumed by the safety validators
//!
//! All fields are optional: a validator only runs the checks it has data for.

use super::text_enum;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

text_enum! {
    /// Child-Pugh classification of hepatic impairment.
    pub enum ChildPugh {
        A => "a",
        B => "b",
        C => "c",
    }
}

impl ChildPugh {
    fn rank(&self) -> u8 {
        match self {
            ChildPugh::A => 1,
            ChildPugh::B => 2,
            ChildPugh::C => 3,
        }
    }

    pub fn at_least(&self, other: ChildPugh) -> bool {
        self.rank() >= other.rank()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenalFunction {
    /// Creatinine clearance in mL/min.
    #[validate(range(min = 0.0, max = 250.0))]
    pub creatinine_clearance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HepaticFunction {
    /// ALT as a multiple of the upper limit of normal.
    #[validate(range(min = 0.0, max = 100.0))]
    pub alt_uln_ratio: Option<f64>,
    pub child_pugh: Option<ChildPugh>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PregnancyStatus {
    pub pregnant: bool,
    pub gestational_weeks: Option<u32>,
    #[serde(default)]
    pub breastfeeding: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceRecord {
    pub doses_prescribed: u32,
    pub doses_taken: u32,
    #[serde(default)]
    pub consecutive_missed_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalContext {
    #[serde(default)]
    #[validate(nested)]
    pub renal: Option<RenalFunction>,
    #[serde(default)]
    #[validate(nested)]
    pub hepatic: Option<HepaticFunction>,
    #[serde(default)]
    pub pregnancy: Option<PregnancyStatus>,
    /// Genotypic resistance mutations, e.g. `K103N`, `M184V`.
    #[serde(default)]
    pub resistance_mutations: Vec<String>,
    /// Latest HIV-1 RNA in copies/mL.
    #[serde(default)]
    pub viral_load: Option<u64>,
    #[serde(default)]
    pub months_on_current_regimen: Option<u32>,
    #[serde(default)]
    pub adherence: Option<AdherenceRecord>,
    /// Time of the exposure event for post-exposure prophylaxis.
    #[serde(default)]
    pub exposure_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_negative_hiv_test: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_pugh_ordering() {
        assert!(ChildPugh::C.at_least(ChildPugh::B));
        assert!(ChildPugh::B.at_least(ChildPugh::B));
        assert!(!ChildPugh::A.at_least(ChildPugh::B));
    }

    #[test]
    fn context_deserializes_from_camel_case() {
        let ctx: ClinicalContext = serde_json::from_value(serde_json::json!({
            "renal": { "creatinineClearance": 42.0 },
            "pregnancy": { "pregnant": true, "gestationalWeeks": 10 },
            "resistanceMutations": ["K103N"],
        }))
        .unwrap();
        assert_eq!(ctx.renal.unwrap().creatinine_clearance, Some(42.0));
        assert_eq!(ctx.pregnancy.unwrap().gestational_weeks, Some(10));
        assert_eq!(ctx.resistance_mutations, vec!["K103N".to_string()]);
    }
}
