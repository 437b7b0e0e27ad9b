use crate::{
    db::{DoctorRepository, Repositories},
    models::{doctor::NewDoctor, Doctor},
    Error, Result,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoctorRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub specialization: String,
    #[validate(length(max = 500))]
    pub qualification: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 80))]
    pub experience_years: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub specialization: Option<String>,
    #[validate(length(max = 500))]
    pub qualification: Option<String>,
    #[validate(range(min = 0, max = 80))]
    pub experience_years: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub struct DoctorService {
    doctors: Arc<dyn DoctorRepository>,
}

impl DoctorService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            doctors: repos.doctors.clone(),
        }
    }

    pub async fn create(&self, request: CreateDoctorRequest) -> Result<Doctor> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        if self.doctors.find_by_email(&email).await?.is_some() {
            return Err(Error::Conflict(format!("Email '{email}' already in use")));
        }

        let doctor = self
            .doctors
            .create(NewDoctor {
                user_id: request.user_id,
                full_name: request.full_name.trim().to_string(),
                email,
                specialization: request.specialization.trim().to_string(),
                qualification: request.qualification,
                experience_years: request.experience_years,
            })
            .await?;
        tracing::info!(doctor_id = %doctor.id, "Doctor created");
        Ok(doctor)
    }

    pub async fn get(&self, id: Uuid) -> Result<Doctor> {
        self.doctors
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Doctor", id))
    }

    pub async fn list(&self, query: DoctorListQuery) -> Result<Vec<Doctor>> {
        self.doctors.list(query.active_only).await
    }

    pub async fn update(&self, id: Uuid, request: UpdateDoctorRequest) -> Result<Doctor> {
        request.validate()?;
        let mut doctor = self.get(id).await?;

        if let Some(full_name) = request.full_name {
            doctor.full_name = full_name.trim().to_string();
        }
        if let Some(email) = request.email {
            doctor.email = email.trim().to_lowercase();
        }
        if let Some(specialization) = request.specialization {
            doctor.specialization = specialization.trim().to_string();
        }
        if let Some(qualification) = request.qualification {
            doctor.qualification = Some(qualification);
        }
        if let Some(years) = request.experience_years {
            doctor.experience_years = years;
        }
        if let Some(active) = request.is_active {
            doctor.is_active = active;
        }

        self.doctors.update(&doctor).await
    }

    /// Soft delete: the doctor stays referenced by past treatments and meetings.
    pub async fn deactivate(&self, id: Uuid) -> Result<Doctor> {
        let mut doctor = self.get(id).await?;
        if !doctor.is_active {
            return Ok(doctor);
        }
        doctor.is_active = false;
        let doctor = self.doctors.update(&doctor).await?;
        tracing::info!(doctor_id = %id, "Doctor deactivated");
        Ok(doctor)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.doctors.delete(id).await? {
            return Err(Error::not_found("Doctor", id));
        }
        tracing::info!(doctor_id = %id, "Doctor deleted");
        Ok(())
    }
}
