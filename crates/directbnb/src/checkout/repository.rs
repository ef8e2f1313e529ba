use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leads::LeadId;
use crate::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadId(pub u64);

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit record of a verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeWebhookPayload {
    pub id: PayloadId,
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub lead_id: Option<LeadId>,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed_successfully: bool,
}

pub trait WebhookPayloadRepository: Send + Sync {
    fn insert(
        &self,
        payload: StripeWebhookPayload,
    ) -> Result<StripeWebhookPayload, RepositoryError>;
    fn update(&self, payload: StripeWebhookPayload) -> Result<(), RepositoryError>;
    fn fetch(&self, id: PayloadId) -> Result<Option<StripeWebhookPayload>, RepositoryError>;
    /// Deliveries in the order they were received.
    fn list(&self) -> Result<Vec<StripeWebhookPayload>, RepositoryError>;
}
