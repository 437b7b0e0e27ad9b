//! Orders and the payment gateway webhook.

use crate::{
    services::payment::{CreateOrderRequest, TransferNotification},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response> {
    let (order, payment) = state.payment_service.create_order(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "order": order, "payment": payment })),
    )
        .into_response())
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let order = state.payment_service.get_order(id).await?;
    Ok((StatusCode::OK, Json(order)).into_response())
}

pub async fn get_payment_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let payment = state.payment_service.get_payment_by_code(&code).await?;
    Ok((StatusCode::OK, Json(payment)).into_response())
}

/// Gateway notification. Every processed payload is acknowledged with 200 so
/// the gateway stops retrying; the outcome says what happened.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<TransferNotification>,
) -> Result<Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    state.payment_service.verify_api_key(authorization)?;

    let outcome = state.payment_service.handle_webhook(notification).await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}
