use super::PostgresStore;
use crate::{
    db::traits::MeetingRepository,
    models::{
        meeting::{MeetingFilter, NewMeetingRecord},
        MeetingRecord, PageRequest,
    },
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const MEETING_COLUMNS: &str =
    "id, patient_id, doctor_id, meeting_link, start_time, end_time, notes, created_at, updated_at";

fn map_meeting(row: &PgRow) -> Result<MeetingRecord> {
    Ok(MeetingRecord {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        doctor_id: row.try_get("doctor_id")?,
        meeting_link: row.try_get("meeting_link")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &MeetingFilter) {
    builder.push(" WHERE TRUE");
    if let Some(patient_id) = filter.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(doctor_id) = filter.doctor_id {
        builder.push(" AND doctor_id = ").push_bind(doctor_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND start_time >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND start_time <= ").push_bind(to);
    }
}

#[async_trait]
impl MeetingRepository for PostgresStore {
    async fn create(&self, new: NewMeetingRecord) -> Result<MeetingRecord> {
        let sql = format!(
            "INSERT INTO meeting_records
                (id, patient_id, doctor_id, meeting_link, start_time, end_time, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MEETING_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.patient_id)
            .bind(new.doctor_id)
            .bind(&new.meeting_link)
            .bind(new.start_time)
            .bind(new.end_time)
            .bind(&new.notes)
            .fetch_one(&self.pool)
            .await?;
        map_meeting(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetingRecord>> {
        let sql = format!("SELECT {MEETING_COLUMNS} FROM meeting_records WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_meeting).transpose()
    }

    async fn list(
        &self,
        filter: &MeetingFilter,
        page: PageRequest,
    ) -> Result<(Vec<MeetingRecord>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM meeting_records");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {MEETING_COLUMNS} FROM meeting_records"));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY start_time DESC LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_meeting).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn update(&self, record: &MeetingRecord) -> Result<MeetingRecord> {
        let sql = format!(
            "UPDATE meeting_records
             SET doctor_id = $2, meeting_link = $3, start_time = $4, end_time = $5, notes = $6,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {MEETING_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(record.id)
            .bind(record.doctor_id)
            .bind(&record.meeting_link)
            .bind(record.start_time)
            .bind(record.end_time)
            .bind(&record.notes)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Meeting record", record.id))?;
        map_meeting(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meeting_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
