//! # REST API for Student Management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use shared::{CreateStudentRequest, StudentListResponse, UpdateStudentRequest};
use tracing::{error, info};

use super::roster_error_status;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StudentSearchQuery {
    /// Matches name or roll number, ignoring case
    pub q: Option<String>,
}

/// List students ordered by roll number, optionally filtered by `q`
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentSearchQuery>,
) -> impl IntoResponse {
    info!("GET /api/students - q: {:?}", query.q);

    let result = match query.q.as_deref() {
        Some(q) => state.roster_service.search_students(q).await,
        None => state.roster_service.list_students().await,
    };
    match result {
        Ok(students) => (StatusCode::OK, Json(StudentListResponse { students })).into_response(),
        Err(e) => {
            error!("Failed to list students: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error listing students").into_response()
        }
    }
}

pub async fn create_student(
    State(state): State<AppState>,
    Json(request): Json<CreateStudentRequest>,
) -> impl IntoResponse {
    info!("POST /api/students - request: {:?}", request);

    match state.roster_service.create_student(request).await {
        Ok(student) => (StatusCode::CREATED, Json(student)).into_response(),
        Err(e) => {
            error!("Failed to create student: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/students/{}", student_id);

    match state.roster_service.get_student(&student_id).await {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(e) => (roster_error_status(&e), e.to_string()).into_response(),
    }
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<UpdateStudentRequest>,
) -> impl IntoResponse {
    info!("PUT /api/students/{} - request: {:?}", student_id, request);

    match state.roster_service.update_student(&student_id, request).await {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(e) => {
            error!("Failed to update student: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/students/{}", student_id);

    match state.roster_service.delete_student(&student_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete student: {}", e);
            (roster_error_status(&e), e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use shared::{Student, StudentListResponse};

    #[tokio::test]
    async fn test_student_crud() {
        let (router, _state) = test_app().await;

        let response = send(&router, empty_request("GET", "/api/students")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let list: StudentListResponse = read_json(response).await;
        assert_eq!(list.students.len(), 10);

        let response = send(
            &router,
            json_request(
                "POST",
                "/api/students",
                serde_json::json!({
                    "roll_number": "O19CS011",
                    "name": "Ravi Teja",
                    "course": "B.Tech",
                    "year": 3,
                    "section": "B"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Student = read_json(response).await;

        let response = send(
            &router,
            json_request(
                "PUT",
                &format!("/api/students/{}", created.id),
                serde_json::json!({ "section": "C" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Student = read_json(response).await;
        assert_eq!(updated.section, "C");

        let response = send(
            &router,
            empty_request("DELETE", &format!("/api/students/{}", created.id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(
            &router,
            empty_request("GET", &format!("/api/students/{}", created.id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_student_search_query() {
        let (router, _state) = test_app().await;

        let search = |q: &str| empty_request("GET", &format!("/api/students?q={}", q));

        let list: StudentListResponse = read_json(send(&router, search("o19cs003")).await).await;
        assert_eq!(list.students.len(), 1);
        assert_eq!(list.students[0].roll_number, "O19CS003");

        let list: StudentListResponse = read_json(send(&router, search("zzz")).await).await;
        assert!(list.students.is_empty());

        let list: StudentListResponse = read_json(send(&router, search("")).await).await;
        assert_eq!(list.students.len(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_roll_number_conflicts() {
        let (router, _state) = test_app().await;

        let response = send(
            &router,
            json_request(
                "POST",
                "/api/students",
                serde_json::json!({
                    "roll_number": "O19CS001",
                    "name": "Someone Else",
                    "course": "B.Tech",
                    "year": 3,
                    "section": "A"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(read_text(response).await.contains("O19CS001"));
    }
}
