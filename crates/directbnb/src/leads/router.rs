use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::domain::{LeadId, LeadPatch, LeadSubmission, OptionId, OptionPatch, OptionSubmission};
use super::service::{LeadError, LeadService};
use crate::access::AccessPolicy;
use crate::responses;

#[derive(Clone)]
pub struct LeadsState {
    pub service: Arc<LeadService>,
    pub access: AccessPolicy,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionQuery {
    pub lead_registration: Option<String>,
}

pub fn leads_router(state: LeadsState) -> Router {
    Router::new()
        .route(
            "/api/v1/builder/leads",
            get(list_leads_handler).post(register_handler),
        )
        .route(
            "/api/v1/builder/leads/:lead_id",
            get(lead_handler)
                .put(update_lead_handler)
                .patch(update_lead_handler),
        )
        .route(
            "/api/v1/builder/registration-options",
            get(list_options_handler).post(add_option_handler),
        )
        .route(
            "/api/v1/builder/registration-options/:option_id",
            get(option_handler)
                .put(update_option_handler)
                .patch(update_option_handler),
        )
        .with_state(state)
}

pub(crate) async fn list_leads_handler(
    State(state): State<LeadsState>,
    Query(query): Query<LeadQuery>,
) -> Response {
    match state.service.list(query.email.as_deref()) {
        Ok(leads) => (StatusCode::OK, Json(leads)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn register_handler(
    State(state): State<LeadsState>,
    Json(submission): Json<LeadSubmission>,
) -> Response {
    match state.service.register(submission, Utc::now()) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn lead_handler(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    let Some(id) = LeadId::parse(&lead_id) else {
        return lead_error(LeadError::NotFound);
    };
    match state.service.get(&id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn update_lead_handler(
    State(state): State<LeadsState>,
    Path(lead_id): Path<String>,
    Json(patch): Json<LeadPatch>,
) -> Response {
    let Some(id) = LeadId::parse(&lead_id) else {
        return lead_error(LeadError::NotFound);
    };
    match state.service.update(&id, patch, Utc::now()).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn list_options_handler(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    Query(query): Query<OptionQuery>,
) -> Response {
    if !state.access.resolve(&headers).is_authenticated() {
        return responses::unauthorized();
    }
    let lead = match query.lead_registration.as_deref() {
        None => None,
        Some(raw) => match LeadId::parse(raw) {
            Some(id) => Some(id),
            None => return (StatusCode::OK, Json(Vec::<()>::new())).into_response(),
        },
    };
    match state.service.list_options(lead.as_ref()) {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn add_option_handler(
    State(state): State<LeadsState>,
    Json(submission): Json<OptionSubmission>,
) -> Response {
    match state.service.add_option(submission, Utc::now()) {
        Ok(option) => (StatusCode::CREATED, Json(option)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn option_handler(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    Path(option_id): Path<u64>,
) -> Response {
    if !state.access.resolve(&headers).is_authenticated() {
        return responses::unauthorized();
    }
    match state.service.option(OptionId(option_id)) {
        Ok(option) => (StatusCode::OK, Json(option)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) async fn update_option_handler(
    State(state): State<LeadsState>,
    Path(option_id): Path<u64>,
    Json(patch): Json<OptionPatch>,
) -> Response {
    match state
        .service
        .update_option(OptionId(option_id), patch, Utc::now())
    {
        Ok(option) => (StatusCode::OK, Json(option)).into_response(),
        Err(err) => lead_error(err),
    }
}

pub(crate) fn lead_error(err: LeadError) -> Response {
    match err {
        LeadError::Validation(errors) => responses::invalid(&errors),
        LeadError::NotFound => responses::error(StatusCode::NOT_FOUND, "Not found."),
        LeadError::Completed => responses::error(
            StatusCode::FORBIDDEN,
            "Registration options cannot be changed after the registration is completed.",
        ),
        LeadError::Checkout(err) => crate::checkout::router::checkout_error(err),
        LeadError::Repository(other) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}
