use super::{text_column, PostgresStore};
use crate::{
    db::traits::ScheduleRepository,
    models::{doctor::NewSchedule, DoctorSchedule, Shift},
    Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

const SCHEDULE_COLUMNS: &str = "id, doctor_id, date, shift, is_off, created_at";

fn map_schedule(row: &PgRow) -> Result<DoctorSchedule> {
    Ok(DoctorSchedule {
        id: row.try_get("id")?,
        doctor_id: row.try_get("doctor_id")?,
        date: row.try_get("date")?,
        shift: text_column(row, "shift")?,
        is_off: row.try_get("is_off")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ScheduleRepository for PostgresStore {
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<DoctorSchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM doctor_schedules
             WHERE date BETWEEN $1 AND $2
               AND ($3::UUID IS NULL OR doctor_id = $3)
             ORDER BY date ASC, shift DESC, doctor_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .bind(doctor_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_schedule).collect()
    }

    async fn replace_working_rows(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        rows: Vec<NewSchedule>,
    ) -> Result<Vec<DoctorSchedule>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM doctor_schedules
             WHERE date BETWEEN $1 AND $2 AND is_off = FALSE",
        )
        .bind(from)
        .bind(to)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO doctor_schedules (id, doctor_id, date, shift, is_off)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let mut inserted = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(row.doctor_id)
                .bind(row.date)
                .bind(row.shift.as_str())
                .bind(row.is_off)
                .fetch_one(&mut *tx)
                .await?;
            inserted.push(map_schedule(&record)?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn mark_off(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        shift: Shift,
    ) -> Result<DoctorSchedule> {
        let sql = format!(
            "INSERT INTO doctor_schedules (id, doctor_id, date, shift, is_off)
             VALUES ($1, $2, $3, $4, TRUE)
             ON CONFLICT (doctor_id, date, shift) DO UPDATE SET is_off = TRUE
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(doctor_id)
            .bind(date)
            .bind(shift.as_str())
            .fetch_one(&self.pool)
            .await?;
        map_schedule(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM doctor_schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
