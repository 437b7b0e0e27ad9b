use crate::{
    config::PaginationConfig,
    db::{DoctorRepository, MeetingRepository, Repositories},
    models::{
        meeting::{MeetingFilter, NewMeetingRecord},
        MeetingRecord, PageRequest, Paginated,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_times(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<()> {
    match end {
        Some(end) if end <= start => Err(Error::Validation(
            "endTime must be after startTime".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[validate(url)]
    pub meeting_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    pub doctor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub meeting_link: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub struct MeetingService {
    meetings: Arc<dyn MeetingRepository>,
    doctors: Arc<dyn DoctorRepository>,
    pagination: PaginationConfig,
}

impl MeetingService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            meetings: repos.meetings.clone(),
            doctors: repos.doctors.clone(),
            pagination,
        }
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<()> {
        match self.doctors.find_by_id(doctor_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found("Doctor", doctor_id)),
        }
    }

    pub async fn create(&self, request: CreateMeetingRequest) -> Result<MeetingRecord> {
        request.validate()?;
        check_times(request.start_time, request.end_time)?;
        self.require_doctor(request.doctor_id).await?;

        let record = self
            .meetings
            .create(NewMeetingRecord {
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                meeting_link: request.meeting_link,
                start_time: request.start_time,
                end_time: request.end_time,
                notes: request.notes,
            })
            .await?;
        tracing::info!(meeting_id = %record.id, doctor_id = %record.doctor_id, "Meeting recorded");
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<MeetingRecord> {
        self.meetings
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Meeting record", id))
    }

    pub async fn list(&self, query: MeetingListQuery) -> Result<Paginated<MeetingRecord>> {
        let page = PageRequest::new(
            query.page,
            query.limit,
            self.pagination.default_limit,
            self.pagination.max_limit,
        );
        let filter = MeetingFilter {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
            from: query.from,
            to: query.to,
        };
        let (items, total) = self.meetings.list(&filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn update(&self, id: Uuid, request: UpdateMeetingRequest) -> Result<MeetingRecord> {
        let mut record = self.get(id).await?;

        if let Some(doctor_id) = request.doctor_id.filter(|d| *d != record.doctor_id) {
            self.require_doctor(doctor_id).await?;
            record.doctor_id = doctor_id;
        }
        if let Some(link) = request.meeting_link {
            record.meeting_link = link;
        }
        if let Some(start) = request.start_time {
            record.start_time = start;
        }
        if let Some(end) = request.end_time {
            record.end_time = end;
        }
        if let Some(notes) = request.notes {
            record.notes = notes;
        }
        check_times(record.start_time, record.end_time)?;

        self.meetings.update(&record).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.meetings.delete(id).await? {
            return Err(Error::not_found("Meeting record", id));
        }
        Ok(())
    }
}
