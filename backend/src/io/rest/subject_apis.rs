//! # REST API for Subject Management

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use shared::{CreateSubjectRequest, SubjectListResponse, UpdateSubjectRequest};
use tracing::{error, info};

use super::roster_error_status;
use crate::AppState;

/// List all subjects ordered by code
pub async fn list_subjects(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/subjects");

    match state.roster_service.list_subjects().await {
        Ok(subjects) => (StatusCode::OK, Json(SubjectListResponse { subjects })).into_response(),
        Err(e) => {
            error!("Failed to list subjects: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error listing subjects").into_response()
        }
    }
}

pub async fn create_subject(
    State(state): State<AppState>,
    Json(request): Json<CreateSubjectRequest>,
) -> impl IntoResponse {
    info!("POST /api/subjects - request: {:?}", request);

    match state.roster_service.create_subject(request).await {
        Ok(subject) => (StatusCode::CREATED, Json(subject)).into_response(),
        Err(e) => {
            error!("Failed to create subject: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}

pub async fn update_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Json(request): Json<UpdateSubjectRequest>,
) -> impl IntoResponse {
    info!("PUT /api/subjects/{} - request: {:?}", subject_id, request);

    match state.roster_service.update_subject(&subject_id, request).await {
        Ok(subject) => (StatusCode::OK, Json(subject)).into_response(),
        Err(e) => {
            error!("Failed to update subject: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}

pub async fn delete_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/subjects/{}", subject_id);

    match state.roster_service.delete_subject(&subject_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete subject: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}
