use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::service::{SubmitOutcome, WizardError, WizardService};
use crate::access::AccessPolicy;
use crate::responses;

#[derive(Clone)]
pub struct WizardRouterState {
    pub service: Arc<WizardService>,
    pub access: AccessPolicy,
}

pub fn wizard_router(state: WizardRouterState) -> Router {
    Router::new()
        .route(
            "/api/v1/wizard/:session",
            get(view_handler).post(submit_handler),
        )
        .route("/api/v1/wizard/:session/back", post(back_handler))
        .route("/api/v1/wizard/:session/reset", post(reset_handler))
        .with_state(state)
}

pub(crate) async fn view_handler(
    State(state): State<WizardRouterState>,
    headers: HeaderMap,
    Path(session): Path<String>,
) -> Response {
    let user = state.access.resolve(&headers).user_id();
    match state.service.view(&session, user) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => wizard_error(err),
    }
}

pub(crate) async fn submit_handler(
    State(state): State<WizardRouterState>,
    headers: HeaderMap,
    Path(session): Path<String>,
    Json(input): Json<Value>,
) -> Response {
    let user = state.access.resolve(&headers).user_id();
    match state
        .service
        .submit(&session, user, input, Utc::now())
        .await
    {
        Ok(outcome @ SubmitOutcome::Advanced(_)) => {
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Ok(outcome @ SubmitOutcome::Completed { .. }) => {
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Err(err) => wizard_error(err),
    }
}

pub(crate) async fn back_handler(
    State(state): State<WizardRouterState>,
    headers: HeaderMap,
    Path(session): Path<String>,
) -> Response {
    let user = state.access.resolve(&headers).user_id();
    match state.service.back(&session, user) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => wizard_error(err),
    }
}

pub(crate) async fn reset_handler(
    State(state): State<WizardRouterState>,
    headers: HeaderMap,
    Path(session): Path<String>,
) -> Response {
    let user = state.access.resolve(&headers).user_id();
    match state.service.reset(&session, user) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => wizard_error(err),
    }
}

fn wizard_error(err: WizardError) -> Response {
    match err {
        WizardError::Validation(errors) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
        }
        WizardError::SessionExpired => responses::error(StatusCode::BAD_REQUEST, err),
        WizardError::Payment(_) => responses::error(StatusCode::BAD_GATEWAY, err),
        WizardError::Leads(_) | WizardError::Catalog(_) | WizardError::Repository(_) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}
