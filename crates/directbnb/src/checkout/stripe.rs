use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::gateway::{
    AccountSummary, CheckoutRequest, CheckoutSession, GatewayError, NewWebhookEndpoint,
    PaymentGateway, WebhookEndpoint,
};
use crate::config::StripeConfig;

/// Stripe REST client speaking the form-encoded v1 API.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn key(&self) -> Result<&str, GatewayError> {
        self.secret_key.as_deref().ok_or(GatewayError::NotConfigured)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(self.key()?)
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.key()?)
            .form(form)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pulls `error.message` out of a Stripe error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Flattens a checkout request into Stripe's bracketed form keys.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    for (index, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{index}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            item.currency.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        debug!(
            client_reference_id = %request.client_reference_id,
            items = request.line_items.len(),
            "creating stripe checkout session"
        );
        self.post("checkout/sessions", &checkout_form(request)).await
    }

    async fn list_checkout_sessions(
        &self,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, GatewayError> {
        let list: ListResponse<CheckoutSession> = self
            .get("checkout/sessions", &[("limit", limit.to_string())])
            .await?;
        Ok(list.data)
    }

    async fn list_webhook_endpoints(&self) -> Result<Vec<WebhookEndpoint>, GatewayError> {
        let list: ListResponse<WebhookEndpoint> = self
            .get("webhook_endpoints", &[("limit", "100".to_string())])
            .await?;
        Ok(list.data)
    }

    async fn create_webhook_endpoint(
        &self,
        endpoint: &NewWebhookEndpoint,
    ) -> Result<WebhookEndpoint, GatewayError> {
        let mut form = vec![("url".to_string(), endpoint.url.clone())];
        for (index, event) in endpoint.enabled_events.iter().enumerate() {
            form.push((format!("enabled_events[{index}]"), event.clone()));
        }
        self.post("webhook_endpoints", &form).await
    }

    async fn retrieve_account(&self) -> Result<AccountSummary, GatewayError> {
        self.get("account", &[]).await
    }
}
