use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// The part of a Stripe event envelope the webhook dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    #[serde(default)]
    pub created: Option<i64>,
}

impl StripeEvent {
    /// Requires `id`, `type` and an object under `data.object`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let event: StripeEvent =
            serde_json::from_value(value.clone()).map_err(|err| err.to_string())?;
        if event.id.trim().is_empty() {
            return Err("event id is empty".to_string());
        }
        if !event.data.object.is_object() {
            return Err("data.object must be an object".to_string());
        }
        Ok(event)
    }

    pub fn client_reference_id(&self) -> Option<&str> {
        self.data
            .object
            .get("client_reference_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_completed_session_reference() {
        let value = json!({
            "id": "evt_1",
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "id": "cs_1", "client_reference_id": " lead-9 " } }
        });
        let event = StripeEvent::from_value(&value).expect("event parses");
        assert_eq!(event.event_type, CHECKOUT_COMPLETED);
        assert_eq!(event.client_reference_id(), Some("lead-9"));
        assert_eq!(event.session_id(), Some("cs_1"));
    }

    #[test]
    fn rejects_envelopes_without_object() {
        assert!(StripeEvent::from_value(&json!({ "id": "evt_1", "type": "x" })).is_err());
        assert!(StripeEvent::from_value(
            &json!({ "id": "evt_1", "type": "x", "data": { "object": 4 } })
        )
        .is_err());
    }
}
