use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use super::session::{CheckoutError, CheckoutService};
use super::signature::{SignatureError, SIGNATURE_HEADER};
use super::webhook::{WebhookError, WebhookOutcome, WebhookService};
use crate::leads::LeadId;
use crate::responses;

#[derive(Clone)]
pub struct CheckoutState {
    pub checkout: Arc<CheckoutService>,
    pub webhooks: Arc<WebhookService>,
}

/// Hosted checkout redirects, landing pages and the Stripe webhook.
pub fn checkout_router(state: CheckoutState) -> Router {
    Router::new()
        .route("/api/v1/builder/stripe-webhook", post(stripe_webhook_handler))
        .route("/builder/checkout/:lead_id", get(checkout_redirect_handler))
        .route(
            "/builder/checkout_success/:lead_id",
            get(checkout_success_handler),
        )
        .route(
            "/builder/checkout_cancelled/:lead_id",
            get(checkout_cancelled_handler),
        )
        .with_state(state)
}

pub(crate) async fn stripe_webhook_handler(
    State(state): State<CheckoutState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.webhooks.handle(signature, &body, Utc::now()) {
        Ok(outcome) => {
            let status = match outcome {
                WebhookOutcome::Completed(_) => "processed",
                WebhookOutcome::Expired { .. } => "expired",
                WebhookOutcome::Ignored { .. } => "ignored",
            };
            (StatusCode::OK, Json(json!({ "status": status }))).into_response()
        }
        Err(err) => webhook_error(err),
    }
}

pub(crate) async fn checkout_redirect_handler(
    State(state): State<CheckoutState>,
    Path(lead_id): Path<String>,
) -> Response {
    let Some(lead) = LeadId::parse(&lead_id) else {
        return checkout_error(CheckoutError::LeadNotFound);
    };
    match state
        .checkout
        .create_for_lead(&lead, Utc::now().date_naive())
        .await
    {
        Ok(session) => match session.url {
            Some(url) => Redirect::to(&url).into_response(),
            None => checkout_error(CheckoutError::Gateway(
                super::gateway::GatewayError::MissingUrl,
            )),
        },
        Err(err) => checkout_error(err),
    }
}

pub(crate) async fn checkout_success_handler(
    State(state): State<CheckoutState>,
    Path(lead_id): Path<String>,
) -> Response {
    let Some(lead) = LeadId::parse(&lead_id) else {
        return checkout_error(CheckoutError::LeadNotFound);
    };
    match state.checkout.status(&lead) {
        Ok(status) => {
            let message = if status.is_paid() {
                "Payment received. Check your inbox to verify your email address."
            } else {
                "Payment is being processed. You will receive an email once it is confirmed."
            };
            (
                StatusCode::OK,
                Json(json!({
                    "status": if status.is_paid() { "paid" } else { "pending" },
                    "message": message,
                    "lead": status,
                })),
            )
                .into_response()
        }
        Err(err) => checkout_error(err),
    }
}

pub(crate) async fn checkout_cancelled_handler(
    State(state): State<CheckoutState>,
    Path(lead_id): Path<String>,
) -> Response {
    let Some(lead) = LeadId::parse(&lead_id) else {
        return checkout_error(CheckoutError::LeadNotFound);
    };
    match state.checkout.status(&lead) {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "status": "cancelled",
                "message": "Checkout was cancelled. Your selections have been kept.",
                "checkout_url": format!("/builder/checkout/{lead}"),
                "lead": status,
            })),
        )
            .into_response(),
        Err(err) => checkout_error(err),
    }
}

pub(crate) fn checkout_error(err: CheckoutError) -> Response {
    match err {
        CheckoutError::LeadNotFound => responses::error(StatusCode::NOT_FOUND, "Not found."),
        CheckoutError::LeadCompleted => responses::error(StatusCode::CONFLICT, err),
        CheckoutError::EmptyCart => responses::error(StatusCode::BAD_REQUEST, err),
        CheckoutError::InvalidAmount(_) | CheckoutError::Repository(_) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
        CheckoutError::Gateway(gateway) => responses::error(StatusCode::BAD_GATEWAY, gateway),
    }
}

fn webhook_error(err: WebhookError) -> Response {
    match err {
        WebhookError::Signature(SignatureError::NotConfigured) => responses::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
        ),
        WebhookError::Signature(SignatureError::MissingHeader) => {
            responses::error(StatusCode::BAD_REQUEST, "Missing signature")
        }
        WebhookError::Signature(_) => {
            responses::error(StatusCode::BAD_REQUEST, "Invalid signature")
        }
        WebhookError::InvalidPayload(_) => {
            responses::error(StatusCode::BAD_REQUEST, "Invalid payload")
        }
        WebhookError::MissingReference | WebhookError::UnknownLead(_) => {
            responses::error(StatusCode::BAD_REQUEST, err)
        }
        WebhookError::Reconcile(_) | WebhookError::Repository(_) => {
            responses::error(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}
