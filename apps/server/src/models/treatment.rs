//! Patient treatments and patient-specific medication overrides

use super::text_enum;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

text_enum! {
    pub enum TreatmentStatus {
        Active => "active",
        Completed => "completed",
        Stopped => "stopped",
    }
}

text_enum! {
    pub enum DurationUnit {
        Day => "day",
        Week => "week",
        Month => "month",
    }
}

impl DurationUnit {
    pub fn days(&self) -> i64 {
        match self {
            DurationUnit::Day => 1,
            DurationUnit::Week => 7,
            DurationUnit::Month => 30,
        }
    }
}

text_enum! {
    /// Time of day a custom medication is taken.
    pub enum DoseTime {
        Morning => "morning",
        Noon => "noon",
        Afternoon => "afternoon",
        Evening => "evening",
        Night => "night",
    }
}

/// Ad-hoc medicine entry layered on top of a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomMedication {
    /// Catalogue medicine this entry refers to, if any.
    #[serde(default)]
    pub medicine_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub dosage: String,
    #[validate(length(min = 1, max = 100))]
    pub frequency: String,
    #[validate(range(min = 1, max = 3650))]
    pub duration_value: i32,
    pub duration_unit: DurationUnit,
    /// Price per dose; falls back to the catalogue price.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub schedule: Option<DoseTime>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CustomMedication {
    pub fn duration_days(&self) -> i64 {
        i64::from(self.duration_value.max(0)) * self.duration_unit.days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientTreatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub protocol_id: Option<Uuid>,
    pub custom_medications: Option<Vec<CustomMedication>>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_cost: Decimal,
    pub status: TreatmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientTreatment {
    /// A treatment is open while it is active and has no past end date.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.status == TreatmentStatus::Active && self.end_date.map_or(true, |end| end >= today)
    }

    pub fn custom_medications(&self) -> &[CustomMedication] {
        self.custom_medications.as_deref().unwrap_or(&[])
    }

    /// Inclusive length in days, when the end date is known.
    pub fn span_days(&self) -> Option<i64> {
        self.end_date
            .map(|end| (end - self.start_date).num_days() + 1)
    }
}

/// Insert shape for a treatment; ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTreatment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub protocol_id: Option<Uuid>,
    pub custom_medications: Option<Vec<CustomMedication>>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_cost: Decimal,
    pub notes: Option<String>,
}

/// Repository-level filter for treatment searches.
#[derive(Debug, Clone, Default)]
pub struct TreatmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub protocol_id: Option<Uuid>,
    /// `Some(true)` keeps open treatments, `Some(false)` ended ones.
    pub open: Option<bool>,
    /// Reference date for the open/ended split.
    pub today: Option<NaiveDate>,
    pub start_from: Option<NaiveDate>,
    pub start_to: Option<NaiveDate>,
    pub newest_first: bool,
}

impl TreatmentFilter {
    pub fn matches(&self, t: &PatientTreatment) -> bool {
        if self.patient_id.is_some_and(|id| id != t.patient_id) {
            return false;
        }
        if self.doctor_id.is_some_and(|id| id != t.doctor_id) {
            return false;
        }
        if self.protocol_id.is_some() && self.protocol_id != t.protocol_id {
            return false;
        }
        if let Some(open) = self.open {
            let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
            if t.is_open_on(today) != open {
                return false;
            }
        }
        if self.start_from.is_some_and(|from| t.start_date < from) {
            return false;
        }
        if self.start_to.is_some_and(|to| t.start_date > to) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treatment(status: TreatmentStatus, end: Option<NaiveDate>) -> PatientTreatment {
        let now = Utc::now();
        PatientTreatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            protocol_id: None,
            custom_medications: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: end,
            total_cost: Decimal::ZERO,
            status,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_means_active_without_past_end_date() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(treatment(TreatmentStatus::Active, None).is_open_on(today));
        assert!(treatment(TreatmentStatus::Active, Some(today)).is_open_on(today));
        assert!(!treatment(TreatmentStatus::Active, today.pred_opt()).is_open_on(today));
        assert!(!treatment(TreatmentStatus::Completed, None).is_open_on(today));
    }

    #[test]
    fn span_is_inclusive() {
        let t = treatment(
            TreatmentStatus::Active,
            NaiveDate::from_ymd_opt(2024, 1, 28),
        );
        assert_eq!(t.span_days(), Some(28));
    }

    #[test]
    fn duration_units_convert_to_days() {
        assert_eq!(DurationUnit::Week.days(), 7);
        assert_eq!("MONTH".parse::<DurationUnit>().unwrap(), DurationUnit::Month);
        assert!("fortnight".parse::<DurationUnit>().is_err());
    }
}
