//! # REST API for Requests to the Administrators

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use shared::AdminRequest;
use tracing::{error, info, warn};

use crate::domain::RequestError;
use crate::AppState;

pub async fn submit_request(
    State(state): State<AppState>,
    Json(request): Json<AdminRequest>,
) -> impl IntoResponse {
    info!("POST /api/requests");

    match state.request_service.submit(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e @ RequestError::Delivery(_)) => {
            error!("{:#}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
        Err(e) => {
            warn!("Rejected request: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use shared::AdminRequestResponse;

    #[tokio::test]
    async fn test_add_student_request() {
        let (router, _state) = test_app().await;

        let response = send(
            &router,
            json_request(
                "POST",
                "/api/requests",
                serde_json::json!({ "type": "add_student", "roll_number": "O19CS011", "name": "Ravi Teja" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: AdminRequestResponse = read_json(response).await;
        assert!(body.success);
        assert_eq!(body.message, "Request sent successfully!");
    }

    #[tokio::test]
    async fn test_short_support_message_is_rejected() {
        let (router, _state) = test_app().await;

        let response = send(
            &router,
            json_request("POST", "/api/requests", serde_json::json!({ "type": "support", "message": "hi" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
