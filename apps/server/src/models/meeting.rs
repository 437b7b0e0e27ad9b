use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub meeting_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMeetingRecord {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub meeting_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MeetingFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MeetingFilter {
    pub fn matches(&self, m: &MeetingRecord) -> bool {
        self.patient_id.map_or(true, |id| id == m.patient_id)
            && self.doctor_id.map_or(true, |id| id == m.doctor_id)
            && self.from.map_or(true, |from| m.start_time >= from)
            && self.to.map_or(true, |to| m.start_time <= to)
    }
}
