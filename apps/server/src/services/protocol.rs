use crate::{
    db::{ProtocolRepository, Repositories},
    models::{
        protocol::{NewMedicine, NewProtocol, NewProtocolMedicine},
        DurationUnit, Medicine, ProtocolCategory, ProtocolWithMedicines, TreatmentProtocol,
    },
    Error, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMedicineRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub strength: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMedicineRequest {
    pub medicine_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub dosage: String,
    #[validate(length(min = 1, max = 100))]
    pub frequency: String,
    #[validate(range(min = 1, max = 3650))]
    pub duration_value: Option<i32>,
    pub duration_unit: Option<DurationUnit>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProtocolRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub category: ProtocolCategory,
    #[validate(range(min = 1, max = 3650))]
    pub duration_days: Option<i32>,
    #[validate(length(min = 1), nested)]
    pub medicines: Vec<ProtocolMedicineRequest>,
}

pub struct ProtocolService {
    protocols: Arc<dyn ProtocolRepository>,
}

impl ProtocolService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            protocols: repos.protocols.clone(),
        }
    }

    pub async fn create_medicine(&self, request: CreateMedicineRequest) -> Result<Medicine> {
        request.validate()?;
        if request.unit_price < Decimal::ZERO {
            return Err(Error::Validation("unitPrice must not be negative".to_string()));
        }
        let medicine = self
            .protocols
            .create_medicine(NewMedicine {
                name: request.name.trim().to_string(),
                strength: request.strength,
                unit: request.unit,
                unit_price: request.unit_price,
            })
            .await?;
        tracing::info!(medicine_id = %medicine.id, name = %medicine.name, "Medicine created");
        Ok(medicine)
    }

    pub async fn list_medicines(&self) -> Result<Vec<Medicine>> {
        self.protocols.list_medicines().await
    }

    pub async fn create_protocol(&self, request: CreateProtocolRequest) -> Result<ProtocolWithMedicines> {
        request.validate()?;
        for line in &request.medicines {
            if line.duration_value.is_some() != line.duration_unit.is_some() {
                return Err(Error::Validation(
                    "durationValue and durationUnit must be given together".to_string(),
                ));
            }
        }

        let protocol = self
            .protocols
            .create_protocol(NewProtocol {
                name: request.name.trim().to_string(),
                description: request.description,
                category: request.category,
                duration_days: request.duration_days,
                medicines: request
                    .medicines
                    .into_iter()
                    .map(|line| NewProtocolMedicine {
                        medicine_id: line.medicine_id,
                        dosage: line.dosage,
                        frequency: line.frequency,
                        duration_value: line.duration_value,
                        duration_unit: line.duration_unit,
                        notes: line.notes,
                    })
                    .collect(),
            })
            .await?;
        tracing::info!(
            protocol_id = %protocol.protocol.id,
            medicines = protocol.medicines.len(),
            "Protocol created"
        );
        Ok(protocol)
    }

    pub async fn get_protocol(&self, id: Uuid) -> Result<ProtocolWithMedicines> {
        self.protocols
            .find_protocol(id)
            .await?
            .ok_or_else(|| Error::not_found("Protocol", id))
    }

    pub async fn list_protocols(&self) -> Result<Vec<TreatmentProtocol>> {
        self.protocols.list_protocols().await
    }
}
