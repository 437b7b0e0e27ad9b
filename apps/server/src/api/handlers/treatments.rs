//! Treatment handlers: lifecycle, pricing, safety validation and queries.

use crate::{
    models::ClinicalContext,
    services::treatment::{
        business::{
            CreateTreatmentRequest, EndTreatmentRequest, PreviewCostRequest,
            UpdateTreatmentRequest, ValidateRegimenRequest,
        },
        query::TreatmentSearchQuery,
    },
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

pub async fn create_treatment(
    State(state): State<AppState>,
    Json(request): Json<CreateTreatmentRequest>,
) -> Result<Response> {
    let outcome = state.treatment_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub async fn search_treatments(
    State(state): State<AppState>,
    Query(query): Query<TreatmentSearchQuery>,
) -> Result<Response> {
    let page = state.treatment_query_service.search(query).await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub async fn get_treatment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let details = state.treatment_query_service.get(id).await?;
    Ok((StatusCode::OK, Json(details)).into_response())
}

pub async fn update_treatment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTreatmentRequest>,
) -> Result<Response> {
    let outcome = state.treatment_service.update(id, request).await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub async fn end_treatment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<EndTreatmentRequest>>,
) -> Result<Response> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let treatment = state.treatment_service.end(id, request).await?;
    Ok((StatusCode::OK, Json(treatment)).into_response())
}

pub async fn delete_treatment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state.treatment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn preview_cost(
    State(state): State<AppState>,
    Json(request): Json<PreviewCostRequest>,
) -> Result<Response> {
    let cost = state.treatment_service.preview_cost(request).await?;
    Ok((StatusCode::OK, Json(cost)).into_response())
}

pub async fn recalculate_cost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let result = state.treatment_service.recalculate_cost(id).await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}

pub async fn validate_regimen(
    State(state): State<AppState>,
    Json(request): Json<ValidateRegimenRequest>,
) -> Result<Response> {
    let report = state.treatment_service.validate_regimen(request).await?;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub async fn validate_treatment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(clinical): Json<ClinicalContext>,
) -> Result<Response> {
    let report = state
        .treatment_service
        .validate_existing(id, clinical)
        .await?;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub async fn patient_history(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Response> {
    let history = state
        .treatment_query_service
        .patient_history(patient_id)
        .await?;
    Ok((StatusCode::OK, Json(history)).into_response())
}

pub async fn active_treatment(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Response> {
    match state
        .treatment_query_service
        .active_for_patient(patient_id)
        .await?
    {
        Some(treatment) => Ok((StatusCode::OK, Json(treatment)).into_response()),
        None => Err(crate::Error::NotFound(format!(
            "Patient {patient_id} has no open treatment"
        ))),
    }
}
