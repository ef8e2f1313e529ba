use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::deployer::{project_name, DeployRequest, DeployScheduler, SiteDeployer};
use super::DeployError;
use crate::access::AccessPolicy;
use crate::leads::LeadId;
use crate::properties::PropertyId;
use crate::responses;
use crate::validation::FieldErrors;

#[derive(Clone)]
pub struct DeployState {
    pub deployer: Arc<SiteDeployer>,
    pub scheduler: Arc<dyn DeployScheduler>,
    pub access: AccessPolicy,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployBody {
    #[serde(default)]
    pub lead_id: Option<String>,
}

pub fn deploy_router(state: DeployState) -> Router {
    Router::new()
        .route("/api/v1/properties/:property_id/deploy", post(deploy_handler))
        .with_state(state)
}

pub(crate) async fn deploy_handler(
    State(state): State<DeployState>,
    headers: HeaderMap,
    Path(property_id): Path<u64>,
    Json(body): Json<DeployBody>,
) -> Response {
    if !state.access.resolve(&headers).is_admin() {
        return responses::forbidden();
    }
    let Some(raw) = body.lead_id.as_deref().filter(|raw| !raw.trim().is_empty()) else {
        return responses::invalid(&FieldErrors::single("lead_id", "This field is required."));
    };
    let Some(lead) = LeadId::parse(raw) else {
        return responses::invalid(&FieldErrors::single("lead_id", "Must be a valid UUID."));
    };

    let request = DeployRequest {
        property: PropertyId(property_id),
        lead,
    };
    if let Err(err) = state.deployer.check(&request) {
        return deploy_error(err);
    }
    match state.scheduler.schedule(request) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Deployment started.",
                "project": project_name(&lead),
            })),
        )
            .into_response(),
        Err(err) => deploy_error(err),
    }
}

fn deploy_error(err: DeployError) -> Response {
    match err {
        DeployError::PropertyNotFound(_) | DeployError::LeadNotFound(_) => {
            responses::error(StatusCode::NOT_FOUND, err)
        }
        other => responses::error(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}
