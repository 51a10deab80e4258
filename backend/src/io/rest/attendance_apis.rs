//! # REST API for Marking Attendance
//!
//! Fetch and save the attendance of one (date, subject). Dates default to
//! the server's today when omitted; only today can be saved.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{AttendanceMapResponse, SaveAttendanceRequest};
use tracing::{error, info, warn};

use crate::domain::SaveError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub date: Option<NaiveDate>,
    pub subject_id: String,
}

fn save_error_status(error: &SaveError) -> StatusCode {
    match error {
        SaveError::ReadOnlyDate { .. } => StatusCode::FORBIDDEN,
        SaveError::NoStudentsPresent => StatusCode::UNPROCESSABLE_ENTITY,
        SaveError::UnknownStudent(_)
        | SaveError::DuplicateStudent(_)
        | SaveError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SaveError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Stored statuses of (date, subject); students without a record are absent
pub async fn get_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> impl IntoResponse {
    let date = query
        .date
        .unwrap_or_else(|| state.attendance_service.today());
    info!("GET /api/attendance - date: {}, subject: {}", date, query.subject_id);

    match state
        .attendance_service
        .fetch_attendance(date, &query.subject_id)
        .await
    {
        Ok(statuses) => {
            let response = AttendanceMapResponse {
                date,
                subject_id: query.subject_id,
                statuses: statuses.into_iter().collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to fetch attendance: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch attendance records",
            )
                .into_response()
        }
    }
}

pub async fn save_attendance(
    State(state): State<AppState>,
    Json(request): Json<SaveAttendanceRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/attendance - date: {}, subject: {}",
        request.date, request.subject_id
    );

    match state.attendance_service.save(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            match &e {
                SaveError::Storage(_) => error!("{:#}", e),
                _ => warn!("Rejected attendance save: {}", e),
            }
            (save_error_status(&e), e.to_string()).into_response()
        }
    }
}

pub async fn get_attendance_stats(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> impl IntoResponse {
    let date = query
        .date
        .unwrap_or_else(|| state.attendance_service.today());
    info!("GET /api/attendance/stats - date: {}, subject: {}", date, query.subject_id);

    match state.attendance_service.stats(date, &query.subject_id).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!("Failed to compute attendance stats: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error computing stats").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use shared::{AttendanceMapResponse, AttendanceStats, AttendanceStatus, SaveAttendanceResponse};

    fn save_body(date: &str, present: &[&str]) -> serde_json::Value {
        let statuses: Vec<_> = present
            .iter()
            .map(|id| serde_json::json!({ "student_id": id, "status": "present" }))
            .collect();
        serde_json::json!({
            "date": date,
            "subject_id": "2",
            "statuses": statuses,
            "marked_by_id": "1"
        })
    }

    #[tokio::test]
    async fn test_save_then_fetch_fills_whole_roster() {
        let (router, _state) = test_app().await;
        let date = today().to_string();

        let response = send(&router, json_request("POST", "/api/attendance", save_body(&date, &["1", "3"]))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let saved: SaveAttendanceResponse = read_json(response).await;
        assert_eq!(saved.saved_count, 10);
        assert_eq!(saved.present_count, 2);
        assert!(saved.warning.is_none());

        let response = send(
            &router,
            empty_request("GET", &format!("/api/attendance?date={}&subject_id=2", date)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let map: AttendanceMapResponse = read_json(response).await;
        assert_eq!(map.statuses.len(), 10);
        assert_eq!(map.statuses["1"], AttendanceStatus::Present);
        assert_eq!(map.statuses["2"], AttendanceStatus::Absent);

        let stats: AttendanceStats = read_json(
            send(&router, empty_request("GET", "/api/attendance/stats?subject_id=2")).await,
        )
        .await;
        assert_eq!(stats.total_students, 10);
        assert_eq!(stats.present_students, 2);
        assert_eq!(stats.absent_students, 8);
    }

    #[tokio::test]
    async fn test_past_dates_are_read_only() {
        let (router, _state) = test_app().await;
        let yesterday = today().pred_opt().unwrap().to_string();

        let response = send(&router, json_request("POST", "/api/attendance", save_body(&yesterday, &["1"]))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(read_text(response).await.contains("read-only"));
    }

    #[tokio::test]
    async fn test_unknown_student_is_bad_request() {
        let (router, _state) = test_app().await;
        let date = today().to_string();

        let response = send(&router, json_request("POST", "/api/attendance", save_body(&date, &["99"]))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nobody_present_warns() {
        let (router, _state) = test_app().await;
        let date = today().to_string();

        let response = send(&router, json_request("POST", "/api/attendance", save_body(&date, &[]))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let saved: SaveAttendanceResponse = read_json(response).await;
        assert_eq!(saved.present_count, 0);
        assert!(saved.warning.is_some());
    }
}
