use super::{map_unique_violation, PostgresStore};
use crate::{
    db::traits::DoctorRepository,
    models::{doctor::NewDoctor, Doctor},
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

const DOCTOR_COLUMNS: &str = "id, user_id, full_name, email, specialization, qualification, \
     experience_years, is_active, created_at, updated_at";

fn map_doctor(row: &PgRow) -> Result<Doctor> {
    Ok(Doctor {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        specialization: row.try_get("specialization")?,
        qualification: row.try_get("qualification")?,
        experience_years: row.try_get("experience_years")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DoctorRepository for PostgresStore {
    async fn create(&self, new: NewDoctor) -> Result<Doctor> {
        let sql = format!(
            "INSERT INTO doctors
                (id, user_id, full_name, email, specialization, qualification, experience_years)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {DOCTOR_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(&new.full_name)
            .bind(&new.email)
            .bind(&new.specialization)
            .bind(&new.qualification)
            .bind(new.experience_years)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, format!("Email '{}' already in use", new.email)))?;
        map_doctor(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_doctor).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE LOWER(email) = LOWER($1)");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_doctor).transpose()
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Doctor>> {
        let sql = format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors
             WHERE ($1 = FALSE OR is_active = TRUE)
             ORDER BY full_name ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_doctor).collect()
    }

    async fn update(&self, doctor: &Doctor) -> Result<Doctor> {
        let sql = format!(
            "UPDATE doctors
             SET user_id = $2, full_name = $3, email = $4, specialization = $5,
                 qualification = $6, experience_years = $7, is_active = $8, updated_at = NOW()
             WHERE id = $1
             RETURNING {DOCTOR_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(doctor.id)
            .bind(doctor.user_id)
            .bind(&doctor.full_name)
            .bind(&doctor.email)
            .bind(&doctor.specialization)
            .bind(&doctor.qualification)
            .bind(doctor.experience_years)
            .bind(doctor.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                map_unique_violation(e, format!("Email '{}' already in use", doctor.email))
            })?
            .ok_or_else(|| Error::not_found("Doctor", doctor.id))?;
        map_doctor(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM doctors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
