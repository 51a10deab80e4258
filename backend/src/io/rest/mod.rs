//! # REST API Interface Layer
//!
//! HTTP endpoints of the attendance portal. Handlers translate requests into
//! service calls and map domain errors to status codes; they hold no
//! business logic of their own.
//!
//! ## Endpoints
//!
//! - `/api/students`, `/api/subjects`: roster management
//! - `/api/attendance`: fetch and save one class, stats, change stream
//! - `/api/reports/attendance`: percentages for every student
//! - `/api/auth/*`: login, logout, current user, subjects to mark
//! - `/api/requests`: add-student and support requests
//! - `/api/logs`: client log forwarding

pub mod attendance_apis;
pub mod auth_apis;
pub mod logging_apis;
pub mod realtime_apis;
pub mod request_apis;
pub mod student_apis;
pub mod subject_apis;
pub mod summary_apis;

pub use attendance_apis::*;
pub use auth_apis::*;
pub use logging_apis::*;
pub use realtime_apis::*;
pub use request_apis::*;
pub use student_apis::*;
pub use subject_apis::*;
pub use summary_apis::*;

use axum::http::StatusCode;

use crate::domain::RosterError;

pub(crate) fn roster_error_status(error: &RosterError) -> StatusCode {
    match error {
        RosterError::Invalid(_) => StatusCode::BAD_REQUEST,
        RosterError::DuplicateRollNumber(_) | RosterError::DuplicateSubjectCode(_) => {
            StatusCode::CONFLICT
        }
        RosterError::StudentNotFound(_) | RosterError::SubjectNotFound(_) => StatusCode::NOT_FOUND,
        RosterError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
