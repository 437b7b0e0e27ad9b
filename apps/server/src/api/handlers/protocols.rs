use crate::{
    services::protocol::{CreateMedicineRequest, CreateProtocolRequest},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

pub async fn create_protocol(
    State(state): State<AppState>,
    Json(request): Json<CreateProtocolRequest>,
) -> Result<Response> {
    let protocol = state.protocol_service.create_protocol(request).await?;
    Ok((StatusCode::CREATED, Json(protocol)).into_response())
}

pub async fn list_protocols(State(state): State<AppState>) -> Result<Response> {
    let protocols = state.protocol_service.list_protocols().await?;
    Ok((StatusCode::OK, Json(protocols)).into_response())
}

pub async fn get_protocol(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let protocol = state.protocol_service.get_protocol(id).await?;
    Ok((StatusCode::OK, Json(protocol)).into_response())
}

pub async fn create_medicine(
    State(state): State<AppState>,
    Json(request): Json<CreateMedicineRequest>,
) -> Result<Response> {
    let medicine = state.protocol_service.create_medicine(request).await?;
    Ok((StatusCode::CREATED, Json(medicine)).into_response())
}

pub async fn list_medicines(State(state): State<AppState>) -> Result<Response> {
    let medicines = state.protocol_service.list_medicines().await?;
    Ok((StatusCode::OK, Json(medicines)).into_response())
}
