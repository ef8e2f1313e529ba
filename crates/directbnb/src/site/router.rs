use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{ColorSchemeId, ThemeId, WebsiteId};
use super::service::{ColorSchemeInput, SiteError, SiteService, ThemeInput, WebsiteInput};
use crate::access::AccessPolicy;
use crate::responses;

#[derive(Clone)]
pub struct SiteState {
    pub service: Arc<SiteService>,
    pub access: AccessPolicy,
}

/// Theme, color scheme and website endpoints of the site builder.
pub fn site_router(state: SiteState) -> Router {
    Router::new()
        .route(
            "/api/v1/builder/themes",
            get(list_themes).post(create_theme),
        )
        .route(
            "/api/v1/builder/themes/:theme_id",
            get(get_theme)
                .put(update_theme)
                .patch(update_theme)
                .delete(delete_theme),
        )
        .route(
            "/api/v1/builder/color-schemes",
            get(list_color_schemes).post(create_color_scheme),
        )
        .route(
            "/api/v1/builder/color-schemes/:scheme_id",
            get(get_color_scheme)
                .put(update_color_scheme)
                .patch(update_color_scheme)
                .delete(delete_color_scheme),
        )
        .route(
            "/api/v1/builder/websites",
            get(list_websites).post(create_website),
        )
        .route(
            "/api/v1/builder/websites/:website_id",
            get(get_website).put(update_website).patch(update_website),
        )
        .route(
            "/api/v1/builder/websites/:website_id/configuration",
            get(website_configuration),
        )
        .route(
            "/api/v1/builder/websites/:website_id/scrape-airbnb",
            post(scrape_airbnb),
        )
        .route(
            "/api/v1/builder/websites/:website_id/scrape-booking",
            post(scrape_booking),
        )
        .with_state(state)
}

async fn list_themes(State(state): State<SiteState>) -> Response {
    respond(state.service.themes(), StatusCode::OK)
}

async fn get_theme(State(state): State<SiteState>, Path(id): Path<u64>) -> Response {
    respond(state.service.theme(ThemeId(id)), StatusCode::OK)
}

async fn create_theme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Json(input): Json<ThemeInput>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    respond(state.service.create_theme(input), StatusCode::CREATED)
}

async fn update_theme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<ThemeInput>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    respond(state.service.update_theme(ThemeId(id), input), StatusCode::OK)
}

async fn delete_theme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    match state.service.delete_theme(ThemeId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => site_error(err),
    }
}

async fn list_color_schemes(State(state): State<SiteState>) -> Response {
    respond(state.service.color_schemes(), StatusCode::OK)
}

async fn get_color_scheme(State(state): State<SiteState>, Path(id): Path<u64>) -> Response {
    respond(state.service.color_scheme(ColorSchemeId(id)), StatusCode::OK)
}

async fn create_color_scheme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Json(input): Json<ColorSchemeInput>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    respond(state.service.create_color_scheme(input), StatusCode::CREATED)
}

async fn update_color_scheme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<ColorSchemeInput>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    respond(
        state.service.update_color_scheme(ColorSchemeId(id), input),
        StatusCode::OK,
    )
}

async fn delete_color_scheme(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    match state.service.delete_color_scheme(ColorSchemeId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => site_error(err),
    }
}

async fn list_websites(State(state): State<SiteState>, headers: HeaderMap) -> Response {
    let principal = state.access.resolve(&headers);
    respond(state.service.websites(principal), StatusCode::OK)
}

async fn get_website(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.configuration(principal, WebsiteId(id)),
        StatusCode::OK,
    )
}

async fn create_website(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Json(input): Json<WebsiteInput>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.create_website(principal, input),
        StatusCode::CREATED,
    )
}

async fn update_website(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<WebsiteInput>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.update_website(principal, WebsiteId(id), input),
        StatusCode::OK,
    )
}

async fn website_configuration(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let principal = state.access.resolve(&headers);
    respond(
        state.service.configuration(principal, WebsiteId(id)),
        StatusCode::OK,
    )
}

async fn scrape_airbnb(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let principal = state.access.resolve(&headers);
    match state.service.scrape_airbnb(principal, WebsiteId(id)) {
        Ok(website) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Airbnb scraping task has been queued",
                "website": website,
            })),
        )
            .into_response(),
        Err(err) => site_error(err),
    }
}

async fn scrape_booking(
    State(state): State<SiteState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let principal = state.access.resolve(&headers);
    match state.service.scrape_booking(principal, WebsiteId(id)) {
        Ok(website) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Booking.com scraping task has been queued",
                "website": website,
            })),
        )
            .into_response(),
        Err(err) => site_error(err),
    }
}

fn respond<T: serde::Serialize>(result: Result<T, SiteError>, status: StatusCode) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => site_error(err),
    }
}

fn site_error(err: SiteError) -> Response {
    match err {
        SiteError::Validation(errors) => responses::invalid(&errors),
        SiteError::NotFound => responses::error(StatusCode::NOT_FOUND, "Not found."),
        SiteError::Unauthenticated => responses::unauthorized(),
        SiteError::InUse(_) => responses::error(StatusCode::CONFLICT, err),
        SiteError::MissingListingUrl(message) => {
            responses::error(StatusCode::BAD_REQUEST, message)
        }
        SiteError::Unsupported(message) => responses::error(StatusCode::NOT_IMPLEMENTED, message),
        SiteError::Scrape(other) => responses::error(StatusCode::SERVICE_UNAVAILABLE, other),
        SiteError::Repository(other) => responses::error(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}
