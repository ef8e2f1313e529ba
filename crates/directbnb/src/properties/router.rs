use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::domain::{PropertyContent, PropertyId};
use super::service::{PropertyError, PropertyService};
use crate::access::AccessPolicy;
use crate::responses;
use crate::users::UserId;

#[derive(Clone)]
pub struct PropertiesState {
    pub service: Arc<PropertyService>,
    pub access: AccessPolicy,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub owner_id: Option<u64>,
    #[serde(default)]
    pub page: Option<usize>,
}

pub fn properties_router(state: PropertiesState) -> Router {
    Router::new()
        .route(
            "/api/v1/properties",
            get(list_properties).post(create_property),
        )
        .route("/api/v1/properties/my-properties", get(my_properties))
        .route(
            "/api/v1/properties/:property_id",
            get(retrieve_property)
                .put(replace_property)
                .delete(delete_property),
        )
        .route(
            "/api/v1/properties/:property_id/sections/:section",
            patch(update_section),
        )
        .with_state(state)
}

async fn list_properties(
    State(state): State<PropertiesState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let owner = query.owner_id.map(UserId);
    respond(
        state.service.list(owner, query.page.unwrap_or(1)),
        StatusCode::OK,
    )
}

async fn my_properties(
    State(state): State<PropertiesState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state
            .service
            .my_properties(principal, query.page.unwrap_or(1)),
        StatusCode::OK,
    )
}

async fn retrieve_property(
    State(state): State<PropertiesState>,
    Path(id): Path<u64>,
) -> Response {
    respond(state.service.retrieve(PropertyId(id)), StatusCode::OK)
}

async fn create_property(
    State(state): State<PropertiesState>,
    headers: HeaderMap,
    Json(content): Json<PropertyContent>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.create(principal, content),
        StatusCode::CREATED,
    )
}

async fn replace_property(
    State(state): State<PropertiesState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(content): Json<PropertyContent>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.replace(principal, PropertyId(id), content),
        StatusCode::OK,
    )
}

async fn update_section(
    State(state): State<PropertiesState>,
    headers: HeaderMap,
    Path((id, section)): Path<(u64, String)>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state
            .service
            .update_section(principal, PropertyId(id), &section, &fields),
        StatusCode::OK,
    )
}

async fn delete_property(
    State(state): State<PropertiesState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let principal = state.access.resolve(&headers);
    match state.service.delete(principal, PropertyId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => property_error(err),
    }
}

fn respond<T: serde::Serialize>(result: Result<T, PropertyError>, status: StatusCode) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => property_error(err),
    }
}

pub(crate) fn property_error(err: PropertyError) -> Response {
    match err {
        PropertyError::NotFound | PropertyError::InvalidPage => {
            responses::error(StatusCode::NOT_FOUND, err)
        }
        PropertyError::Unauthenticated => responses::unauthorized(),
        PropertyError::Forbidden => responses::forbidden(),
        PropertyError::UnknownSection(_) => responses::error(StatusCode::BAD_REQUEST, err),
        PropertyError::Validation(errors) => responses::invalid(&errors),
        PropertyError::Repository(other) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}
