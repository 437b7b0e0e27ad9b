use super::{map_unique_violation, optional_text_column, text_column, PostgresStore};
use crate::{
    db::traits::ProtocolRepository,
    models::{
        protocol::{NewMedicine, NewProtocol, ProtocolMedicineLine},
        Medicine, ProtocolMedicine, ProtocolWithMedicines, TreatmentProtocol,
    },
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;

fn map_medicine(row: &PgRow) -> Result<Medicine> {
    Ok(Medicine {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        strength: row.try_get("strength")?,
        unit: row.try_get("unit")?,
        unit_price: row.try_get("unit_price")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_protocol(row: &PgRow) -> Result<TreatmentProtocol> {
    Ok(TreatmentProtocol {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: text_column(row, "category")?,
        duration_days: row.try_get("duration_days")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_line(row: &PgRow) -> Result<ProtocolMedicineLine> {
    Ok(ProtocolMedicineLine {
        item: ProtocolMedicine {
            id: row.try_get("pm_id")?,
            protocol_id: row.try_get("protocol_id")?,
            medicine_id: row.try_get("medicine_id")?,
            dosage: row.try_get("dosage")?,
            frequency: row.try_get("frequency")?,
            duration_value: row.try_get("duration_value")?,
            duration_unit: optional_text_column(row, "duration_unit")?,
            notes: row.try_get("notes")?,
        },
        medicine: Medicine {
            id: row.try_get("medicine_id")?,
            name: row.try_get("name")?,
            strength: row.try_get("strength")?,
            unit: row.try_get("unit")?,
            unit_price: row.try_get("unit_price")?,
            created_at: row.try_get("medicine_created_at")?,
        },
    })
}

impl PostgresStore {
    async fn protocol_lines(&self, protocol_id: Uuid) -> Result<Vec<ProtocolMedicineLine>> {
        let rows = sqlx::query(
            "SELECT pm.id AS pm_id, pm.protocol_id, pm.medicine_id, pm.dosage, pm.frequency,
                    pm.duration_value, pm.duration_unit, pm.notes,
                    m.name, m.strength, m.unit, m.unit_price, m.created_at AS medicine_created_at
             FROM protocol_medicines pm
             JOIN medicines m ON m.id = pm.medicine_id
             WHERE pm.protocol_id = $1
             ORDER BY pm.position ASC",
        )
        .bind(protocol_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_line).collect()
    }
}

#[async_trait]
impl ProtocolRepository for PostgresStore {
    async fn create_protocol(&self, new: NewProtocol) -> Result<ProtocolWithMedicines> {
        let mut tx = self.pool.begin().await?;
        let protocol_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO treatment_protocols (id, name, description, category, duration_days)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(protocol_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.category.as_str())
        .bind(new.duration_days)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, format!("Protocol '{}' already exists", new.name)))?;

        for (position, line) in new.medicines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO protocol_medicines
                    (id, protocol_id, medicine_id, dosage, frequency, duration_value,
                     duration_unit, notes, position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(Uuid::new_v4())
            .bind(protocol_id)
            .bind(line.medicine_id)
            .bind(&line.dosage)
            .bind(&line.frequency)
            .bind(line.duration_value)
            .bind(line.duration_unit.map(|u| u.as_str()))
            .bind(&line.notes)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_protocol(protocol_id)
            .await?
            .ok_or_else(|| Error::Internal("Protocol vanished after insert".to_string()))
    }

    async fn find_protocol(&self, id: Uuid) -> Result<Option<ProtocolWithMedicines>> {
        let row = sqlx::query(
            "SELECT id, name, description, category, duration_days, created_at
             FROM treatment_protocols WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let protocol = map_protocol(&row)?;
        let medicines = self.protocol_lines(id).await?;
        Ok(Some(ProtocolWithMedicines {
            protocol,
            medicines,
        }))
    }

    async fn list_protocols(&self) -> Result<Vec<TreatmentProtocol>> {
        let rows = sqlx::query(
            "SELECT id, name, description, category, duration_days, created_at
             FROM treatment_protocols ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_protocol).collect()
    }

    async fn create_medicine(&self, new: NewMedicine) -> Result<Medicine> {
        let row = sqlx::query(
            "INSERT INTO medicines (id, name, strength, unit, unit_price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, name, strength, unit, unit_price, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.strength)
        .bind(&new.unit)
        .bind(new.unit_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, format!("Medicine '{}' already exists", new.name)))?;
        map_medicine(&row)
    }

    async fn list_medicines(&self) -> Result<Vec<Medicine>> {
        let rows = sqlx::query(
            "SELECT id, name, strength, unit, unit_price, created_at
             FROM medicines ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_medicine).collect()
    }

    async fn find_medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, name, strength, unit, unit_price, created_at
             FROM medicines WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_medicine).collect()
    }
}
