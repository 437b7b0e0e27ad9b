use super::{text_column, PostgresStore};
use crate::{
    db::traits::TreatmentRepository,
    models::{
        treatment::{NewTreatment, TreatmentFilter},
        CustomMedication, PageRequest, PatientTreatment, TreatmentStatus,
    },
    Error, Result,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{postgres::PgRow, types::Json, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const TREATMENT_COLUMNS: &str = "id, patient_id, doctor_id, protocol_id, custom_medications, \
     start_date, end_date, total_cost, status, notes, created_at, updated_at";

/// Open as of `$today`: active and without a past end date.
const OPEN_PREDICATE: &str = "status = 'active' AND (end_date IS NULL OR end_date >= ";

fn map_treatment(row: &PgRow) -> Result<PatientTreatment> {
    let custom: Option<Json<Vec<CustomMedication>>> = row.try_get("custom_medications")?;
    Ok(PatientTreatment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        doctor_id: row.try_get("doctor_id")?,
        protocol_id: row.try_get("protocol_id")?,
        custom_medications: custom.map(|Json(list)| list),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        total_cost: row.try_get("total_cost")?,
        status: text_column(row, "status")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TreatmentFilter) {
    builder.push(" WHERE TRUE");
    if let Some(patient_id) = filter.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(doctor_id) = filter.doctor_id {
        builder.push(" AND doctor_id = ").push_bind(doctor_id);
    }
    if let Some(protocol_id) = filter.protocol_id {
        builder.push(" AND protocol_id = ").push_bind(protocol_id);
    }
    if let Some(open) = filter.open {
        let today = filter.today.unwrap_or_else(|| Utc::now().date_naive());
        builder.push(if open { " AND (" } else { " AND NOT (" });
        builder.push(OPEN_PREDICATE).push_bind(today).push("))");
    }
    if let Some(from) = filter.start_from {
        builder.push(" AND start_date >= ").push_bind(from);
    }
    if let Some(to) = filter.start_to {
        builder.push(" AND start_date <= ").push_bind(to);
    }
}

async fn insert_treatment<'c, E>(executor: E, new: &NewTreatment) -> Result<PatientTreatment>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let sql = format!(
        "INSERT INTO patient_treatments
            (id, patient_id, doctor_id, protocol_id, custom_medications, start_date, end_date,
             total_cost, status, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9)
         RETURNING {TREATMENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(new.protocol_id)
        .bind(new.custom_medications.as_ref().map(Json))
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.total_cost)
        .bind(&new.notes)
        .fetch_one(executor)
        .await?;
    map_treatment(&row)
}

/// Serializes writes that touch a patient's open treatments until the
/// surrounding transaction ends.
async fn lock_patient(conn: &mut sqlx::PgConnection, patient_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(patient_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Id of another open treatment of the patient, if any.
async fn other_open_treatment(
    conn: &mut sqlx::PgConnection,
    patient_id: Uuid,
    except: Option<Uuid>,
    today: NaiveDate,
) -> Result<Option<Uuid>> {
    let sql = format!(
        "SELECT id FROM patient_treatments
         WHERE patient_id = $1 AND ($2::uuid IS NULL OR id <> $2) AND {OPEN_PREDICATE}$3)
         LIMIT 1"
    );
    let id = sqlx::query_scalar(&sql)
        .bind(patient_id)
        .bind(except)
        .bind(today)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

#[async_trait]
impl TreatmentRepository for PostgresStore {
    async fn create(&self, new: NewTreatment, today: NaiveDate) -> Result<PatientTreatment> {
        let mut tx = self.pool.begin().await?;
        lock_patient(&mut tx, new.patient_id).await?;
        if let Some(open) = other_open_treatment(&mut tx, new.patient_id, None, today).await? {
            return Err(Error::Conflict(format!(
                "Patient {} already has an open treatment ({open})",
                new.patient_id
            )));
        }
        let created = insert_treatment(&mut *tx, &new).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn create_replacing_open(
        &self,
        new: NewTreatment,
        today: NaiveDate,
        close_on: NaiveDate,
    ) -> Result<(PatientTreatment, Vec<Uuid>)> {
        let mut tx = self.pool.begin().await?;
        lock_patient(&mut tx, new.patient_id).await?;

        let sql = format!(
            "UPDATE patient_treatments
             SET status = 'completed', end_date = $3, updated_at = NOW()
             WHERE patient_id = $1 AND {OPEN_PREDICATE}$2)
             RETURNING id"
        );
        let closed: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(new.patient_id)
            .bind(today)
            .bind(close_on)
            .fetch_all(&mut *tx)
            .await?;

        let created = insert_treatment(&mut *tx, &new).await?;
        tx.commit().await?;

        Ok((created, closed))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PatientTreatment>> {
        let sql = format!("SELECT {TREATMENT_COLUMNS} FROM patient_treatments WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_treatment).transpose()
    }

    async fn find_open_for_patient(
        &self,
        patient_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<PatientTreatment>> {
        let sql = format!(
            "SELECT {TREATMENT_COLUMNS} FROM patient_treatments
             WHERE patient_id = $1 AND {OPEN_PREDICATE}$2)
             ORDER BY start_date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_treatment).collect()
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<PatientTreatment>> {
        let sql = format!(
            "SELECT {TREATMENT_COLUMNS} FROM patient_treatments
             WHERE patient_id = $1
             ORDER BY start_date ASC, created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_treatment).collect()
    }

    async fn search(
        &self,
        filter: &TreatmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<PatientTreatment>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM patient_treatments");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {TREATMENT_COLUMNS} FROM patient_treatments"));
        push_filter(&mut select, filter);
        // Direction comes from a boolean, never from user text.
        let order = if filter.newest_first { "DESC" } else { "ASC" };
        select.push(format!(" ORDER BY start_date {order}, created_at {order}"));
        select
            .push(" LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_treatment).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn list_all(&self, filter: &TreatmentFilter) -> Result<Vec<PatientTreatment>> {
        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {TREATMENT_COLUMNS} FROM patient_treatments"));
        push_filter(&mut select, filter);
        select.push(" ORDER BY start_date ASC");
        let rows = select.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_treatment).collect()
    }

    async fn update(&self, treatment: &PatientTreatment, today: NaiveDate) -> Result<PatientTreatment> {
        let mut tx = self.pool.begin().await?;
        lock_patient(&mut tx, treatment.patient_id).await?;
        if treatment.is_open_on(today) {
            if let Some(open) =
                other_open_treatment(&mut tx, treatment.patient_id, Some(treatment.id), today).await?
            {
                return Err(Error::Conflict(format!(
                    "Patient {} already has an open treatment ({open})",
                    treatment.patient_id
                )));
            }
        }

        let sql = format!(
            "UPDATE patient_treatments
             SET doctor_id = $2, protocol_id = $3, custom_medications = $4, start_date = $5,
                 end_date = $6, total_cost = $7, status = $8, notes = $9, updated_at = NOW()
             WHERE id = $1
             RETURNING {TREATMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(treatment.id)
            .bind(treatment.doctor_id)
            .bind(treatment.protocol_id)
            .bind(treatment.custom_medications.as_ref().map(Json))
            .bind(treatment.start_date)
            .bind(treatment.end_date)
            .bind(treatment.total_cost)
            .bind(treatment.status.as_str())
            .bind(&treatment.notes)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found("Treatment", treatment.id))?;
        let updated = map_treatment(&row)?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn end(
        &self,
        id: Uuid,
        end_date: NaiveDate,
        status: TreatmentStatus,
    ) -> Result<PatientTreatment> {
        let sql = format!(
            "UPDATE patient_treatments
             SET end_date = $2, status = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {TREATMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(end_date)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Treatment", id))?;
        map_treatment(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM patient_treatments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
