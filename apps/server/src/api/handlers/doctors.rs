//! Doctor and shift schedule handlers.

use crate::{
    services::{
        doctor::{CreateDoctorRequest, DoctorListQuery, UpdateDoctorRequest},
        schedule::{GenerateWeekRequest, MarkOffRequest, ScheduleListQuery},
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

pub async fn create_doctor(
    State(state): State<AppState>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Response> {
    let doctor = state.doctor_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(doctor)).into_response())
}

pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Response> {
    let doctors = state.doctor_service.list(query).await?;
    Ok((StatusCode::OK, Json(doctors)).into_response())
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let doctor = state.doctor_service.get(id).await?;
    Ok((StatusCode::OK, Json(doctor)).into_response())
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Response> {
    let doctor = state.doctor_service.update(id, request).await?;
    Ok((StatusCode::OK, Json(doctor)).into_response())
}

pub async fn deactivate_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let doctor = state.doctor_service.deactivate(id).await?;
    Ok((StatusCode::OK, Json(doctor)).into_response())
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state.doctor_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn generate_week(
    State(state): State<AppState>,
    Json(request): Json<GenerateWeekRequest>,
) -> Result<Response> {
    let week = state.schedule_service.generate_week(request).await?;
    Ok((StatusCode::CREATED, Json(week)).into_response())
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ScheduleListQuery>,
) -> Result<Response> {
    let rows = state.schedule_service.list(query).await?;
    Ok((StatusCode::OK, Json(rows)).into_response())
}

pub async fn mark_off(
    State(state): State<AppState>,
    Json(request): Json<MarkOffRequest>,
) -> Result<Response> {
    let row = state.schedule_service.mark_off(request).await?;
    Ok((StatusCode::OK, Json(row)).into_response())
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state.schedule_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
