//! Doctors and their shift schedules

use super::text_enum;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum Shift {
        Morning => "morning",
        Afternoon => "afternoon",
    }
}

impl Shift {
    pub const ALL: [Shift; 2] = [Shift::Morning, Shift::Afternoon];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    /// Account id in the identity system, when the doctor can log in.
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact doctor shape embedded in other responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: String,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name.clone(),
            specialization: doctor.specialization.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
    /// Leave marker: the doctor must not be assigned this slot.
    pub is_off: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub shift: Shift,
    pub is_off: bool,
}
