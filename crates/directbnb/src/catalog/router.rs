use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use super::domain::PackageId;
use super::service::{CatalogError, CatalogService, NewPackage, NewPromotion};
use crate::access::AccessPolicy;
use crate::responses;

#[derive(Clone)]
pub struct CatalogState {
    pub service: Arc<CatalogService>,
    pub access: AccessPolicy,
}

/// Public package listing plus admin-only creation endpoints.
pub fn catalog_router(state: CatalogState) -> Router {
    Router::new()
        .route(
            "/api/v1/packages",
            get(list_packages_handler).post(create_package_handler),
        )
        .route("/api/v1/packages/:package_id", get(package_handler))
        .route("/api/v1/promotions", post(create_promotion_handler))
        .with_state(state)
}

pub(crate) async fn list_packages_handler(State(state): State<CatalogState>) -> Response {
    match state.service.grouped(Utc::now().date_naive()) {
        Ok(grouped) => (StatusCode::OK, Json(grouped)).into_response(),
        Err(err) => catalog_error(err),
    }
}

pub(crate) async fn package_handler(
    State(state): State<CatalogState>,
    Path(package_id): Path<u64>,
) -> Response {
    let today = Utc::now().date_naive();
    let result = state
        .service
        .package(PackageId(package_id))
        .and_then(|package| state.service.view(package, today));
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => catalog_error(err),
    }
}

pub(crate) async fn create_package_handler(
    State(state): State<CatalogState>,
    headers: HeaderMap,
    Json(input): Json<NewPackage>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    match state.service.create_package(input) {
        Ok(package) => (StatusCode::CREATED, Json(package)).into_response(),
        Err(err) => catalog_error(err),
    }
}

pub(crate) async fn create_promotion_handler(
    State(state): State<CatalogState>,
    headers: HeaderMap,
    Json(input): Json<NewPromotion>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    match state.service.create_promotion(input) {
        Ok(promotion) => (StatusCode::CREATED, Json(promotion)).into_response(),
        Err(err) => catalog_error(err),
    }
}

fn catalog_error(err: CatalogError) -> Response {
    match err {
        CatalogError::Validation(errors) => responses::invalid(&errors),
        CatalogError::NotFound => responses::error(StatusCode::NOT_FOUND, "Not found."),
        CatalogError::Repository(other) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}
