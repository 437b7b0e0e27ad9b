use crate::{services::treatment::stats::DateRangeQuery, state::AppState, Error, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

pub async fn treatment_stats(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Response> {
    let stats = state.treatment_stats_service.treatment_stats(range).await?;
    Ok((StatusCode::OK, Json(stats)).into_response())
}

pub async fn doctor_workload(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Response> {
    let (Some(from), Some(to)) = (range.from, range.to) else {
        return Err(Error::Validation(
            "from and to are required for the workload report".to_string(),
        ));
    };
    let workload = state
        .treatment_stats_service
        .doctor_workload(from, to)
        .await?;
    Ok((StatusCode::OK, Json(workload)).into_response())
}
