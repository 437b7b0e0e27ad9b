//! Treatment protocols: named standard regimens composed of dosed medicines

use super::{text_enum, DurationUnit};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum ProtocolCategory {
        FirstLine => "first_line",
        SecondLine => "second_line",
        ThirdLine => "third_line",
        /// Post-exposure prophylaxis
        Pep => "pep",
        /// Pre-exposure prophylaxis
        Prep => "prep",
        /// Prevention of mother-to-child transmission
        Pmtct => "pmtct",
        Other => "other",
    }
}

impl ProtocolCategory {
    /// Time-critical regimens whose start is measured against an exposure event.
    pub fn is_emergency(&self) -> bool {
        matches!(self, ProtocolCategory::Pep)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub strength: Option<String>,
    /// Dispensing unit (tablet, capsule, ml).
    pub unit: String,
    /// Price of a single dose in the clinic currency.
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentProtocol {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: ProtocolCategory,
    /// Standard regimen length, used when neither line nor treatment define one.
    pub duration_days: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMedicine {
    pub id: Uuid,
    pub protocol_id: Uuid,
    pub medicine_id: Uuid,
    pub dosage: String,
    pub frequency: String,
    pub duration_value: Option<i32>,
    pub duration_unit: Option<DurationUnit>,
    pub notes: Option<String>,
}

impl ProtocolMedicine {
    pub fn duration_days(&self) -> Option<i64> {
        match (self.duration_value, self.duration_unit) {
            (Some(value), Some(unit)) if value > 0 => Some(i64::from(value) * unit.days()),
            _ => None,
        }
    }
}

/// A protocol medicine with its catalogue entry joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMedicineLine {
    #[serde(flatten)]
    pub item: ProtocolMedicine,
    pub medicine: Medicine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolWithMedicines {
    #[serde(flatten)]
    pub protocol: TreatmentProtocol,
    pub medicines: Vec<ProtocolMedicineLine>,
}

impl ProtocolWithMedicines {
    pub fn medicine_names(&self) -> impl Iterator<Item = &str> {
        self.medicines.iter().map(|line| line.medicine.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub strength: Option<String>,
    pub unit: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewProtocolMedicine {
    pub medicine_id: Uuid,
    pub dosage: String,
    pub frequency: String,
    pub duration_value: Option<i32>,
    pub duration_unit: Option<DurationUnit>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProtocol {
    pub name: String,
    pub description: Option<String>,
    pub category: ProtocolCategory,
    pub duration_days: Option<i32>,
    pub medicines: Vec<NewProtocolMedicine>,
}
