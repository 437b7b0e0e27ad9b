//! Meeting record and blog handlers.

use crate::{
    services::{
        blog::{BlogListQuery, CreateBlogRequest, UpdateBlogRequest},
        meeting::{CreateMeetingRequest, MeetingListQuery, UpdateMeetingRequest},
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

pub async fn create_meeting(
    State(state): State<AppState>,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<Response> {
    let record = state.meeting_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

pub async fn list_meetings(
    State(state): State<AppState>,
    Query(query): Query<MeetingListQuery>,
) -> Result<Response> {
    let page = state.meeting_service.list(query).await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub async fn get_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let record = state.meeting_service.get(id).await?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub async fn update_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMeetingRequest>,
) -> Result<Response> {
    let record = state.meeting_service.update(id, request).await?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub async fn delete_meeting(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state.meeting_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn create_blog(
    State(state): State<AppState>,
    Json(request): Json<CreateBlogRequest>,
) -> Result<Response> {
    let blog = state.blog_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(blog)).into_response())
}

pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Response> {
    let page = state.blog_service.list(query).await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub async fn get_blog(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let blog = state.blog_service.get(id).await?;
    Ok((StatusCode::OK, Json(blog)).into_response())
}

pub async fn get_blog_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let blog = state.blog_service.get_by_slug(&slug).await?;
    Ok((StatusCode::OK, Json(blog)).into_response())
}

pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBlogRequest>,
) -> Result<Response> {
    let blog = state.blog_service.update(id, request).await?;
    Ok((StatusCode::OK, Json(blog)).into_response())
}

pub async fn delete_blog(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    state.blog_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
