//! Read side of treatments: detail view, search and per-patient listings

use super::{CostBreakdown, RegimenPricer};
use crate::{
    config::PaginationConfig,
    db::{DoctorRepository, Repositories, TreatmentRepository},
    models::{
        doctor::DoctorSummary, treatment::TreatmentFilter, PageRequest, Paginated,
        PatientTreatment, ProtocolWithMedicines,
    },
    Error, Result,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Open treatments only.
    Active,
    Ended,
    #[default]
    All,
}

impl StatusFilter {
    fn open(self) -> Option<bool> {
        match self {
            StatusFilter::Active => Some(true),
            StatusFilter::Ended => Some(false),
            StatusFilter::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub protocol_id: Option<Uuid>,
    #[serde(default)]
    pub status: StatusFilter,
    pub start_from: Option<NaiveDate>,
    pub start_to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentDetails {
    #[serde(flatten)]
    pub treatment: PatientTreatment,
    pub protocol: Option<ProtocolWithMedicines>,
    pub doctor: Option<DoctorSummary>,
    pub cost: CostBreakdown,
    pub is_open: bool,
}

pub struct TreatmentQueryService {
    treatments: Arc<dyn TreatmentRepository>,
    doctors: Arc<dyn DoctorRepository>,
    pricer: RegimenPricer,
    pagination: PaginationConfig,
}

impl TreatmentQueryService {
    pub fn new(repos: &Repositories, pricer: RegimenPricer, pagination: PaginationConfig) -> Self {
        Self {
            treatments: repos.treatments.clone(),
            doctors: repos.doctors.clone(),
            pricer,
            pagination,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<TreatmentDetails> {
        let treatment = self
            .treatments
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Treatment", id))?;

        let regimen = self
            .pricer
            .price(
                treatment.protocol_id,
                treatment.custom_medications(),
                treatment.start_date,
                treatment.end_date,
            )
            .await?;
        let doctor = self
            .doctors
            .find_by_id(treatment.doctor_id)
            .await?
            .as_ref()
            .map(DoctorSummary::from);
        let is_open = treatment.is_open_on(Utc::now().date_naive());

        Ok(TreatmentDetails {
            treatment,
            protocol: regimen.protocol,
            doctor,
            cost: regimen.cost,
            is_open,
        })
    }

    pub async fn search(&self, query: TreatmentSearchQuery) -> Result<Paginated<PatientTreatment>> {
        if let (Some(from), Some(to)) = (query.start_from, query.start_to) {
            if to < from {
                return Err(Error::Validation(format!(
                    "startTo {to} is before startFrom {from}"
                )));
            }
        }

        let page = PageRequest::new(
            query.page,
            query.limit,
            self.pagination.default_limit,
            self.pagination.max_limit,
        );
        let filter = TreatmentFilter {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
            protocol_id: query.protocol_id,
            open: query.status.open(),
            today: Some(Utc::now().date_naive()),
            start_from: query.start_from,
            start_to: query.start_to,
            newest_first: query.sort == SortOrder::Desc,
        };

        let (items, total) = self.treatments.search(&filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Every treatment of the patient, oldest first.
    pub async fn patient_history(&self, patient_id: Uuid) -> Result<Vec<PatientTreatment>> {
        self.treatments.list_for_patient(patient_id).await
    }

    /// The patient's open treatment, if any.
    pub async fn active_for_patient(&self, patient_id: Uuid) -> Result<Option<PatientTreatment>> {
        let open = self
            .treatments
            .find_open_for_patient(patient_id, Utc::now().date_naive())
            .await?;
        Ok(open.into_iter().max_by_key(|t| t.start_date))
    }
}
