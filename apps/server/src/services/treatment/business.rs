//! Treatment lifecycle: create, update, end, delete and pricing.
//!
//! A patient has at most one open treatment (active, with no past end date).
//! Creating a second one is a conflict unless the caller asks to replace the
//! open treatment, in which case it is closed the day before the new start in
//! the same transaction as the insert.

use super::{check_dates, check_regimen_shape, CostBreakdown, PricedRegimen, RegimenPricer};
use crate::{
    db::{DoctorRepository, Repositories, TreatmentRepository},
    models::{
        treatment::NewTreatment, ClinicalContext, CustomMedication, PatientTreatment,
        TreatmentStatus,
    },
    services::validation::{self, RegimenInput, ValidationReport},
    Error, Result,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

const MAX_NOTES_LEN: usize = 4000;

fn validate_custom(custom: &[CustomMedication]) -> Result<()> {
    for medication in custom {
        medication.validate()?;
        if medication.price.is_some_and(|price| price < Decimal::ZERO) {
            return Err(Error::Validation(format!(
                "Price of {} must not be negative",
                medication.name
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTreatmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub protocol_id: Option<Uuid>,
    #[serde(default)]
    pub custom_medications: Vec<CustomMedication>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    /// Close the patient's open treatment instead of rejecting the request.
    #[serde(default)]
    pub replace_active: bool,
    #[validate(nested)]
    pub clinical_context: Option<ClinicalContext>,
    /// Persist even when the safety validation reports critical issues.
    #[serde(default)]
    pub override_safety_checks: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTreatmentRequest {
    pub doctor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub protocol_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub custom_medications: Option<Option<Vec<CustomMedication>>>,
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[validate(nested)]
    pub clinical_context: Option<ClinicalContext>,
    #[serde(default)]
    pub override_safety_checks: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    #[default]
    Completed,
    Stopped,
}

impl From<EndReason> for TreatmentStatus {
    fn from(reason: EndReason) -> Self {
        match reason {
            EndReason::Completed => TreatmentStatus::Completed,
            EndReason::Stopped => TreatmentStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndTreatmentRequest {
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub reason: EndReason,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreviewCostRequest {
    pub protocol_id: Option<Uuid>,
    #[serde(default)]
    pub custom_medications: Vec<CustomMedication>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRegimenRequest {
    pub patient_id: Option<Uuid>,
    pub protocol_id: Option<Uuid>,
    #[serde(default)]
    pub custom_medications: Vec<CustomMedication>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(nested)]
    pub clinical_context: ClinicalContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentOutcome {
    pub treatment: PatientTreatment,
    pub cost: CostBreakdown,
    /// Open treatments closed to make room for this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub closed_treatment_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculatedCost {
    pub treatment: PatientTreatment,
    pub previous_total: Decimal,
    pub cost: CostBreakdown,
}

pub struct TreatmentService {
    treatments: Arc<dyn TreatmentRepository>,
    doctors: Arc<dyn DoctorRepository>,
    pricer: RegimenPricer,
}

impl TreatmentService {
    pub fn new(repos: &Repositories, pricer: RegimenPricer) -> Self {
        Self {
            treatments: repos.treatments.clone(),
            doctors: repos.doctors.clone(),
            pricer,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn require_treatment(&self, id: Uuid) -> Result<PatientTreatment> {
        self.treatments
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Treatment", id))
    }

    async fn require_active_doctor(&self, doctor_id: Uuid) -> Result<()> {
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await?
            .ok_or_else(|| Error::not_found("Doctor", doctor_id))?;
        if !doctor.is_active {
            return Err(Error::BusinessRule(format!(
                "Doctor {doctor_id} is inactive and cannot be assigned treatments"
            )));
        }
        Ok(())
    }

    /// Run the safety checks and decide whether the request may proceed.
    fn run_safety_checks(
        &self,
        treatment_id: Option<Uuid>,
        regimen: &PricedRegimen,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        clinical: ClinicalContext,
        history: Vec<PatientTreatment>,
        override_critical: bool,
    ) -> Result<ValidationReport> {
        let report = validation::validate(&regimen_input(
            treatment_id,
            regimen,
            start_date,
            end_date,
            clinical,
            history,
        ));
        if report.has_critical() {
            if !override_critical {
                return Err(Error::UnsafeTreatment(report));
            }
            tracing::warn!(
                critical = report.summary.critical,
                "Critical safety issues overridden"
            );
        }
        Ok(report)
    }

    pub async fn create(&self, request: CreateTreatmentRequest) -> Result<TreatmentOutcome> {
        request.validate()?;
        validate_custom(&request.custom_medications)?;
        check_regimen_shape(request.protocol_id, &request.custom_medications)?;
        check_dates(request.start_date, request.end_date)?;
        self.require_active_doctor(request.doctor_id).await?;

        let regimen = self
            .pricer
            .price(
                request.protocol_id,
                &request.custom_medications,
                request.start_date,
                request.end_date,
            )
            .await?;

        let today = Self::today();
        let open = self
            .treatments
            .find_open_for_patient(request.patient_id, today)
            .await?;
        let close_on = request.start_date - Duration::days(1);
        if !open.is_empty() {
            if !request.replace_active {
                let ids: Vec<String> = open.iter().map(|t| t.id.to_string()).collect();
                return Err(Error::Conflict(format!(
                    "Patient {} already has an open treatment ({})",
                    request.patient_id,
                    ids.join(", ")
                )));
            }
            if let Some(later) = open.iter().find(|t| t.start_date > close_on) {
                return Err(Error::BusinessRule(format!(
                    "Open treatment {} starts on {}; the replacement must start after it",
                    later.id, later.start_date
                )));
            }
        }

        let validation = match request.clinical_context.clone() {
            Some(clinical) => {
                let history: Vec<PatientTreatment> = self
                    .treatments
                    .list_for_patient(request.patient_id)
                    .await?
                    .into_iter()
                    .map(|mut t| {
                        // Replaced treatments are evaluated as already closed.
                        if request.replace_active && open.iter().any(|o| o.id == t.id) {
                            t.status = TreatmentStatus::Completed;
                            t.end_date = Some(close_on);
                        }
                        t
                    })
                    .collect();
                Some(self.run_safety_checks(
                    None,
                    &regimen,
                    request.start_date,
                    request.end_date,
                    clinical,
                    history,
                    request.override_safety_checks,
                )?)
            }
            None => None,
        };

        let new = NewTreatment {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            protocol_id: request.protocol_id,
            custom_medications: (!request.custom_medications.is_empty())
                .then(|| request.custom_medications.clone()),
            start_date: request.start_date,
            end_date: request.end_date,
            total_cost: regimen.cost.total,
            notes: request.notes.clone(),
        };

        let (treatment, closed_treatment_ids) = if open.is_empty() {
            (self.treatments.create(new, today).await?, Vec::new())
        } else {
            self.treatments
                .create_replacing_open(new, today, close_on)
                .await?
        };

        tracing::info!(
            treatment_id = %treatment.id,
            patient_id = %treatment.patient_id,
            total_cost = %treatment.total_cost,
            closed = closed_treatment_ids.len(),
            "Treatment created"
        );

        Ok(TreatmentOutcome {
            treatment,
            cost: regimen.cost,
            closed_treatment_ids,
            validation,
        })
    }

    pub async fn update(&self, id: Uuid, request: UpdateTreatmentRequest) -> Result<TreatmentOutcome> {
        request.validate()?;
        let mut treatment = self.require_treatment(id).await?;

        let regimen_changed = request.protocol_id.is_some()
            || request.custom_medications.is_some()
            || request.start_date.is_some()
            || request.end_date.is_some();

        if let Some(doctor_id) = request.doctor_id.filter(|d| *d != treatment.doctor_id) {
            self.require_active_doctor(doctor_id).await?;
            treatment.doctor_id = doctor_id;
        }
        if let Some(protocol_id) = request.protocol_id {
            treatment.protocol_id = protocol_id;
        }
        if let Some(custom) = request.custom_medications {
            treatment.custom_medications = custom.filter(|c| !c.is_empty());
        }
        if let Some(start) = request.start_date {
            treatment.start_date = start;
        }
        if let Some(end) = request.end_date {
            treatment.end_date = end;
        }
        if let Some(notes) = request.notes {
            if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
                return Err(Error::Validation(format!(
                    "notes: must be at most {MAX_NOTES_LEN} characters"
                )));
            }
            treatment.notes = notes;
        }

        validate_custom(treatment.custom_medications())?;
        check_regimen_shape(treatment.protocol_id, treatment.custom_medications())?;
        check_dates(treatment.start_date, treatment.end_date)?;

        let today = Self::today();
        if treatment.is_open_on(today) {
            let others: Vec<_> = self
                .treatments
                .find_open_for_patient(treatment.patient_id, today)
                .await?
                .into_iter()
                .filter(|t| t.id != treatment.id)
                .collect();
            if let Some(other) = others.first() {
                return Err(Error::Conflict(format!(
                    "Update would leave patient {} with two open treatments (also {})",
                    treatment.patient_id, other.id
                )));
            }
        }

        let regimen = self
            .pricer
            .price(
                treatment.protocol_id,
                treatment.custom_medications(),
                treatment.start_date,
                treatment.end_date,
            )
            .await?;
        if regimen_changed {
            treatment.total_cost = regimen.cost.total;
        }

        let validation = match request.clinical_context {
            Some(clinical) => {
                let history = self.treatments.list_for_patient(treatment.patient_id).await?;
                Some(self.run_safety_checks(
                    Some(treatment.id),
                    &regimen,
                    treatment.start_date,
                    treatment.end_date,
                    clinical,
                    history,
                    request.override_safety_checks,
                )?)
            }
            None => None,
        };

        let treatment = self.treatments.update(&treatment, today).await?;
        tracing::info!(
            treatment_id = %treatment.id,
            repriced = regimen_changed,
            "Treatment updated"
        );

        Ok(TreatmentOutcome {
            treatment,
            cost: regimen.cost,
            closed_treatment_ids: Vec::new(),
            validation,
        })
    }

    pub async fn end(&self, id: Uuid, request: EndTreatmentRequest) -> Result<PatientTreatment> {
        let treatment = self.require_treatment(id).await?;
        if treatment.status != TreatmentStatus::Active {
            return Err(Error::Conflict(format!(
                "Treatment {id} is already {}",
                treatment.status
            )));
        }
        let end_date = request.end_date.unwrap_or_else(Self::today);
        check_dates(treatment.start_date, Some(end_date))?;

        let ended = self
            .treatments
            .end(id, end_date, request.reason.into())
            .await?;
        tracing::info!(
            treatment_id = %id,
            status = %ended.status,
            end_date = %end_date,
            "Treatment ended"
        );
        Ok(ended)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.treatments.delete(id).await? {
            return Err(Error::not_found("Treatment", id));
        }
        tracing::info!(treatment_id = %id, "Treatment deleted");
        Ok(())
    }

    pub async fn preview_cost(&self, request: PreviewCostRequest) -> Result<CostBreakdown> {
        request.validate()?;
        validate_custom(&request.custom_medications)?;
        check_regimen_shape(request.protocol_id, &request.custom_medications)?;
        check_dates(request.start_date, request.end_date)?;
        let regimen = self
            .pricer
            .price(
                request.protocol_id,
                &request.custom_medications,
                request.start_date,
                request.end_date,
            )
            .await?;
        Ok(regimen.cost)
    }

    /// Reprice a stored treatment against current medicine prices.
    pub async fn recalculate_cost(&self, id: Uuid) -> Result<RecalculatedCost> {
        let mut treatment = self.require_treatment(id).await?;
        let regimen = self
            .pricer
            .price(
                treatment.protocol_id,
                treatment.custom_medications(),
                treatment.start_date,
                treatment.end_date,
            )
            .await?;

        let previous_total = treatment.total_cost;
        if previous_total != regimen.cost.total {
            treatment.total_cost = regimen.cost.total;
            treatment = self.treatments.update(&treatment, Self::today()).await?;
            tracing::info!(
                treatment_id = %id,
                previous_total = %previous_total,
                total_cost = %treatment.total_cost,
                "Treatment cost recalculated"
            );
        }

        Ok(RecalculatedCost {
            treatment,
            previous_total,
            cost: regimen.cost,
        })
    }

    /// Safety report for a proposed regimen, without persisting anything.
    pub async fn validate_regimen(&self, request: ValidateRegimenRequest) -> Result<ValidationReport> {
        request.validate()?;
        validate_custom(&request.custom_medications)?;
        check_dates(request.start_date, request.end_date)?;
        let regimen = self
            .pricer
            .price(
                request.protocol_id,
                &request.custom_medications,
                request.start_date,
                request.end_date,
            )
            .await?;
        let history = match request.patient_id {
            Some(patient_id) => self.treatments.list_for_patient(patient_id).await?,
            None => Vec::new(),
        };
        Ok(validation::validate(&regimen_input(
            None,
            &regimen,
            request.start_date,
            request.end_date,
            request.clinical_context,
            history,
        )))
    }

    /// Safety report for a stored treatment against fresh clinical data.
    pub async fn validate_existing(
        &self,
        id: Uuid,
        clinical: ClinicalContext,
    ) -> Result<ValidationReport> {
        clinical.validate()?;
        let treatment = self.require_treatment(id).await?;
        let regimen = self
            .pricer
            .price(
                treatment.protocol_id,
                treatment.custom_medications(),
                treatment.start_date,
                treatment.end_date,
            )
            .await?;
        let history = self.treatments.list_for_patient(treatment.patient_id).await?;
        Ok(validation::validate(&regimen_input(
            Some(treatment.id),
            &regimen,
            treatment.start_date,
            treatment.end_date,
            clinical,
            history,
        )))
    }
}

fn regimen_input(
    treatment_id: Option<Uuid>,
    regimen: &PricedRegimen,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    clinical: ClinicalContext,
    history: Vec<PatientTreatment>,
) -> RegimenInput {
    let planned_days = end_date
        .map(|end| (end - start_date).num_days() + 1)
        .or_else(|| {
            regimen
                .protocol
                .as_ref()
                .and_then(|p| p.protocol.duration_days)
                .map(i64::from)
        });
    RegimenInput {
        treatment_id,
        category: regimen.protocol.as_ref().map(|p| p.protocol.category),
        medicines: regimen.medicine_names(),
        start_date,
        end_date,
        planned_days,
        clinical,
        history,
        now: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: UpdateTreatmentRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(absent.end_date, None);

        let cleared: UpdateTreatmentRequest =
            serde_json::from_value(serde_json::json!({ "endDate": null })).unwrap();
        assert_eq!(cleared.end_date, Some(None));

        let set: UpdateTreatmentRequest =
            serde_json::from_value(serde_json::json!({ "endDate": "2024-02-01" })).unwrap();
        assert_eq!(set.end_date, Some(NaiveDate::from_ymd_opt(2024, 2, 1)));
    }

    #[test]
    fn negative_custom_price_is_invalid() {
        let line = |price: &str| -> CustomMedication {
            serde_json::from_value(serde_json::json!({
                "name": "Cotrimoxazole",
                "dosage": "960 mg",
                "frequency": "once daily",
                "durationValue": 10,
                "durationUnit": "day",
                "price": price
            }))
            .unwrap()
        };
        assert!(validate_custom(&[line("0"), line("1.50")]).is_ok());
        assert!(matches!(
            validate_custom(&[line("-0.01")]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn end_reason_defaults_to_completed() {
        let request: EndTreatmentRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(TreatmentStatus::from(request.reason), TreatmentStatus::Completed);
        let request: EndTreatmentRequest =
            serde_json::from_value(serde_json::json!({ "reason": "stopped" })).unwrap();
        assert_eq!(TreatmentStatus::from(request.reason), TreatmentStatus::Stopped);
    }
}
