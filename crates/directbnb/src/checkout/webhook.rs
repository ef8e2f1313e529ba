use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::event::{StripeEvent, CHECKOUT_COMPLETED, CHECKOUT_EXPIRED};
use super::reconcile::{PaymentReconciler, ReconcileError, Reconciliation};
use super::repository::{PayloadId, StripeWebhookPayload, WebhookPayloadRepository};
use super::signature::{SignatureError, SignatureVerifier};
use crate::leads::LeadId;
use crate::repository::RepositoryError;

static PAYLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payload_id() -> PayloadId {
    PayloadId(PAYLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Completed(Reconciliation),
    Expired { session_id: Option<String> },
    Ignored { event_type: String },
}

/// Verifies, records and dispatches Stripe webhook deliveries.
pub struct WebhookService {
    verifier: SignatureVerifier,
    payloads: Arc<dyn WebhookPayloadRepository>,
    reconciler: Arc<PaymentReconciler>,
}

impl WebhookService {
    pub fn new(
        verifier: SignatureVerifier,
        payloads: Arc<dyn WebhookPayloadRepository>,
        reconciler: Arc<PaymentReconciler>,
    ) -> Self {
        Self {
            verifier,
            payloads,
            reconciler,
        }
    }

    pub fn payloads(&self) -> &Arc<dyn WebhookPayloadRepository> {
        &self.payloads
    }

    pub fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookError> {
        self.verifier.verify(signature, body, now)?;

        let value: Value = serde_json::from_slice(body)
            .map_err(|err| WebhookError::InvalidPayload(err.to_string()))?;
        let event = StripeEvent::from_value(&value).map_err(WebhookError::InvalidPayload)?;

        let mut record = self.payloads.insert(StripeWebhookPayload {
            id: next_payload_id(),
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload: value,
            lead_id: None,
            received_at: now,
            completed_at: None,
            processed_successfully: false,
        })?;
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            payload_id = %record.id,
            "stripe webhook received"
        );

        let result = self.dispatch(&event, &mut record, now);

        record.completed_at = Some(now);
        record.processed_successfully = result.is_ok();
        self.payloads.update(record)?;

        if let Err(err) = &result {
            warn!(event_id = %event.id, error = %err, "stripe webhook processing failed");
        }
        result
    }

    fn dispatch(
        &self,
        event: &StripeEvent,
        record: &mut StripeWebhookPayload,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookError> {
        match event.event_type.as_str() {
            CHECKOUT_COMPLETED => {
                let reference = event
                    .client_reference_id()
                    .ok_or(WebhookError::MissingReference)?;
                let lead_id = LeadId::parse(reference)
                    .ok_or_else(|| WebhookError::UnknownLead(reference.to_string()))?;
                record.lead_id = Some(lead_id);
                match self.reconciler.complete_checkout(&lead_id, now) {
                    Ok(reconciliation) => Ok(WebhookOutcome::Completed(reconciliation)),
                    Err(ReconcileError::LeadNotFound) => {
                        Err(WebhookError::UnknownLead(reference.to_string()))
                    }
                    Err(other) => Err(WebhookError::Reconcile(other)),
                }
            }
            CHECKOUT_EXPIRED => {
                info!(
                    event_id = %event.id,
                    session_id = ?event.session_id(),
                    "checkout session expired"
                );
                Ok(WebhookOutcome::Expired {
                    session_id: event.session_id().map(str::to_string),
                })
            }
            other => Ok(WebhookOutcome::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("checkout session has no client_reference_id")]
    MissingReference,
    #[error("no lead registration matches reference {0}")]
    UnknownLead(String),
    #[error(transparent)]
    Reconcile(ReconcileError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
