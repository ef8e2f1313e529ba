use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::service::{ResendOutcome, UserService, UserServiceError, VerificationOutcome};
use crate::responses;
use crate::validation::FieldErrors;

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
}

pub fn users_router(service: Arc<UserService>) -> Router {
    Router::new()
        .route("/users/verify-email/:token", get(verify_email_handler))
        .route(
            "/api/v1/users/resend-verification",
            post(resend_verification_handler),
        )
        .with_state(service)
}

pub(crate) async fn verify_email_handler(
    State(service): State<Arc<UserService>>,
    Path(token): Path<String>,
) -> Response {
    let Ok(token) = Uuid::parse_str(token.trim()) else {
        return responses::error(StatusCode::NOT_FOUND, "Invalid verification link.");
    };

    match service.verify_email(&token, Utc::now()) {
        Ok(VerificationOutcome::Confirmed(_)) => (
            StatusCode::OK,
            Json(json!({
                "status": "confirmed",
                "message": "Your email has been confirmed. You can now log in.",
            })),
        )
            .into_response(),
        Ok(VerificationOutcome::AlreadyConfirmed(_)) => (
            StatusCode::OK,
            Json(json!({
                "status": "already_confirmed",
                "message": "Your email has already been confirmed.",
            })),
        )
            .into_response(),
        Err(UserServiceError::TokenNotFound) => {
            responses::error(StatusCode::NOT_FOUND, "Invalid verification link.")
        }
        Err(UserServiceError::TokenExpired) => responses::error(
            StatusCode::GONE,
            "This verification link has expired. Please request a new one.",
        ),
        Err(other) => responses::error(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

pub(crate) async fn resend_verification_handler(
    State(service): State<Arc<UserService>>,
    Json(request): Json<ResendRequest>,
) -> Response {
    if request.email.trim().is_empty() {
        return responses::invalid(&FieldErrors::single("email", "This field is required."));
    }

    let message = match service.resend_verification(&request.email, Utc::now()) {
        Ok(ResendOutcome::AlreadyVerified) => "This email address has already been verified.",
        Ok(ResendOutcome::Sent) | Ok(ResendOutcome::Unknown) => {
            "If an account exists for this address, a new verification email has been sent."
        }
        Err(other) => return responses::error(StatusCode::INTERNAL_SERVER_ERROR, other),
    };
    (StatusCode::OK, Json(json!({ "message": message }))).into_response()
}
