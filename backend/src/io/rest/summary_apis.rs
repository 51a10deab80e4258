//! # REST API for Attendance Reports

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info};

use crate::AppState;

/// Overall and per-subject percentages of one student
pub async fn get_student_attendance(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/students/{}/attendance", student_id);

    match state.summary_service.student_attendance(&student_id).await {
        Ok(Some(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("Student not found: {}", student_id),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to summarize attendance for {}: {}", student_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading attendance").into_response()
        }
    }
}

pub async fn get_class_report(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/reports/attendance");

    match state.summary_service.class_report().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Failed to build attendance report: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error building report").into_response()
        }
    }
}
