//! # REST API for Sign-in
//!
//! The portal remembers one signed-in user in its session store, the way a
//! browser keeps it in local storage.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use shared::{CurrentUserResponse, LoginRequest, SubjectListResponse};
use tracing::{error, info, warn};

use crate::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    info!("POST /api/auth/login - email: {}", request.email);

    match state.auth_service.login(&request.email, &request.password) {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => {
            warn!("Rejected login for {}", request.email);
            (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response()
        }
        Err(e) => {
            error!("Login failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/auth/logout");

    match state.auth_service.logout() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Logout failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Logout failed").into_response()
        }
    }
}

pub async fn current_user(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/auth/me");

    match state.auth_service.get_current_user() {
        Ok(user) => (StatusCode::OK, Json(CurrentUserResponse { user })).into_response(),
        Err(e) => {
            error!("Failed to read current user: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error reading session").into_response()
        }
    }
}

/// Subjects the signed-in user can mark attendance for
pub async fn my_subjects(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/auth/subjects");

    let user = match state.auth_service.get_current_user() {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "Not signed in").into_response(),
        Err(e) => {
            error!("Failed to read current user: {:#}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error reading session").into_response();
        }
    };

    match state.roster_service.list_subjects().await {
        Ok(subjects) => {
            let subjects = state.auth_service.subjects_for(&user, &subjects);
            (StatusCode::OK, Json(SubjectListResponse { subjects })).into_response()
        }
        Err(e) => {
            error!("Failed to list subjects: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error listing subjects").into_response()
        }
    }
}
