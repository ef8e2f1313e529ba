use chrono::DateTime;
use clap::Args;
use directbnb::checkout::event::CHECKOUT_COMPLETED;
use directbnb::checkout::{
    AccountSummary, CheckoutSession, GatewayError, NewWebhookEndpoint, PaymentGateway,
    StripeClient, WebhookEndpoint,
};
use directbnb::config::{AppConfig, SiteConfig, StripeConfig};
use directbnb::error::AppError;
use rust_decimal::Decimal;
use tracing::info;

pub(crate) const WEBHOOK_PATH: &str = "/api/v1/builder/stripe-webhook";
const MAX_SESSIONS: u32 = 100;

#[derive(Args, Debug)]
pub(crate) struct ListSessionsArgs {
    /// Number of sessions to show (1-100)
    #[arg(long, default_value_t = 10)]
    pub(crate) limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigReport {
    pub(crate) secret_key_set: bool,
    pub(crate) webhook_secret_set: bool,
    pub(crate) account: Option<AccountSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WebhookSetup {
    Existing(WebhookEndpoint),
    Created(WebhookEndpoint),
}

/// The account is only fetched when a secret key is configured.
pub(crate) async fn check_config(
    stripe: &StripeConfig,
    gateway: &dyn PaymentGateway,
) -> Result<ConfigReport, GatewayError> {
    let account = if stripe.secret_key.is_some() {
        Some(gateway.retrieve_account().await?)
    } else {
        None
    };
    Ok(ConfigReport {
        secret_key_set: stripe.secret_key.is_some(),
        webhook_secret_set: stripe.webhook_secret.is_some(),
        account,
    })
}

fn listens_for_checkout(endpoint: &WebhookEndpoint, url: &str) -> bool {
    endpoint.url == url
        && endpoint
            .enabled_events
            .iter()
            .any(|event| event == CHECKOUT_COMPLETED || event == "*")
}

pub(crate) async fn ensure_webhook(
    site: &SiteConfig,
    gateway: &dyn PaymentGateway,
) -> Result<WebhookSetup, GatewayError> {
    let url = site.absolute(WEBHOOK_PATH);
    let existing = gateway.list_webhook_endpoints().await?;
    if let Some(endpoint) = existing
        .into_iter()
        .find(|endpoint| listens_for_checkout(endpoint, &url))
    {
        return Ok(WebhookSetup::Existing(endpoint));
    }

    let created = gateway
        .create_webhook_endpoint(&NewWebhookEndpoint {
            url,
            enabled_events: vec![CHECKOUT_COMPLETED.to_string()],
        })
        .await?;
    info!(endpoint_id = %created.id, url = %created.url, "stripe webhook endpoint created");
    Ok(WebhookSetup::Created(created))
}

pub(crate) async fn recent_sessions(
    gateway: &dyn PaymentGateway,
    limit: u32,
) -> Result<Vec<CheckoutSession>, GatewayError> {
    gateway
        .list_checkout_sessions(limit.clamp(1, MAX_SESSIONS))
        .await
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn render_config_report(report: &ConfigReport) -> Vec<String> {
    let mut lines = vec![
        format!("STRIPE_SECRET_KEY set: {}", yes_no(report.secret_key_set)),
        format!(
            "STRIPE_WEBHOOK_SECRET set: {}",
            yes_no(report.webhook_secret_set)
        ),
    ];
    match &report.account {
        Some(account) => {
            lines.push(format!(
                "Account {} ({})",
                account.id,
                account.country.as_deref().unwrap_or("unknown country")
            ));
            lines.push(format!(
                "- charges enabled: {} | payouts enabled: {}",
                yes_no(account.charges_enabled),
                yes_no(account.payouts_enabled)
            ));
        }
        None => lines.push("Account not checked: no secret key".to_string()),
    }
    lines
}

pub(crate) fn render_webhook_setup(setup: &WebhookSetup) -> Vec<String> {
    match setup {
        WebhookSetup::Existing(endpoint) => vec![format!(
            "Webhook endpoint {} already delivers {CHECKOUT_COMPLETED} to {}",
            endpoint.id, endpoint.url
        )],
        WebhookSetup::Created(endpoint) => {
            let mut lines = vec![format!(
                "Created webhook endpoint {} for {}",
                endpoint.id, endpoint.url
            )];
            match endpoint.secret.as_deref() {
                Some(secret) => lines.push(format!("Set STRIPE_WEBHOOK_SECRET={secret}")),
                None => lines.push("Stripe returned no signing secret".to_string()),
            }
            lines
        }
    }
}

fn format_amount(session: &CheckoutSession) -> String {
    match session.amount_total {
        Some(minor) => format!(
            "{} {}",
            Decimal::new(minor, 2),
            session.currency.as_deref().unwrap_or("").to_uppercase()
        ),
        None => "-".to_string(),
    }
}

pub(crate) fn render_sessions(sessions: &[CheckoutSession]) -> Vec<String> {
    if sessions.is_empty() {
        return vec!["No checkout sessions found".to_string()];
    }
    sessions
        .iter()
        .map(|session| {
            let created = session
                .created
                .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{} | {} | {} | {} | lead {}",
                session.id,
                created,
                session.payment_status.as_deref().unwrap_or("-"),
                format_amount(session),
                session.client_reference_id.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

pub(crate) async fn run_check_config() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let gateway = StripeClient::new(&config.stripe)?;
    let report = check_config(&config.stripe, &gateway).await?;
    print_lines(render_config_report(&report));
    Ok(())
}

pub(crate) async fn run_ensure_webhook() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let gateway = StripeClient::new(&config.stripe)?;
    let setup = ensure_webhook(&config.site, &gateway).await?;
    print_lines(render_webhook_setup(&setup));
    Ok(())
}

pub(crate) async fn run_list_sessions(args: ListSessionsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let gateway = StripeClient::new(&config.stripe)?;
    let sessions = recent_sessions(&gateway, args.limit).await?;
    print_lines(render_sessions(&sessions));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use directbnb::checkout::{CheckoutRequest, LineItem};
    use directbnb::memory::RecordingGateway;
    use url::Url;

    fn site() -> SiteConfig {
        SiteConfig {
            site_url: Url::parse("https://directbnb.example/").expect("url"),
            admin_token: None,
            email_blacklist: Vec::new(),
            verification_token_ttl_hours: 72,
        }
    }

    fn stripe(secret_key: Option<&str>) -> StripeConfig {
        StripeConfig {
            secret_key: secret_key.map(str::to_string),
            webhook_secret: None,
            api_base: "https://api.stripe.test".to_string(),
            webhook_tolerance_secs: 300,
            currency: "eur".to_string(),
            timeout_secs: 80,
        }
    }

    #[tokio::test]
    async fn check_config_skips_account_without_secret_key() {
        let gateway = RecordingGateway::default();
        let report = check_config(&stripe(None), &gateway)
            .await
            .expect("report");
        assert!(!report.secret_key_set);
        assert!(report.account.is_none());

        let report = check_config(&stripe(Some("sk_test_1")), &gateway)
            .await
            .expect("report");
        assert_eq!(
            report.account.as_ref().map(|account| account.id.as_str()),
            Some("acct_test")
        );
        let lines = render_config_report(&report);
        assert_eq!(lines[0], "STRIPE_SECRET_KEY set: yes");
        assert_eq!(lines[1], "STRIPE_WEBHOOK_SECRET set: no");
    }

    #[tokio::test]
    async fn ensure_webhook_creates_once() {
        let gateway = RecordingGateway::default();
        let setup = ensure_webhook(&site(), &gateway).await.expect("created");
        let WebhookSetup::Created(endpoint) = &setup else {
            panic!("expected a new endpoint, got {setup:?}");
        };
        assert_eq!(
            endpoint.url,
            "https://directbnb.example/api/v1/builder/stripe-webhook"
        );
        assert_eq!(endpoint.enabled_events, vec![CHECKOUT_COMPLETED.to_string()]);
        let lines = render_webhook_setup(&setup);
        assert!(lines[1].starts_with("Set STRIPE_WEBHOOK_SECRET=whsec_"));

        let again = ensure_webhook(&site(), &gateway).await.expect("found");
        assert!(matches!(again, WebhookSetup::Existing(ref found) if found.id == endpoint.id));
    }

    #[tokio::test]
    async fn sessions_are_listed_newest_first() {
        let gateway = RecordingGateway::default();
        assert_eq!(
            render_sessions(&recent_sessions(&gateway, 5).await.expect("empty")),
            vec!["No checkout sessions found".to_string()]
        );

        for reference in ["lead-a", "lead-b"] {
            gateway
                .create_checkout_session(&CheckoutRequest {
                    client_reference_id: reference.to_string(),
                    customer_email: "guest@example.com".to_string(),
                    line_items: vec![LineItem {
                        name: "Website".to_string(),
                        unit_amount: 52_000,
                        currency: "eur".to_string(),
                        quantity: 1,
                    }],
                    success_url: "https://directbnb.example/ok".to_string(),
                    cancel_url: "https://directbnb.example/cancel".to_string(),
                })
                .await
                .expect("session");
        }

        let sessions = recent_sessions(&gateway, 0).await.expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "cs_test_2");

        let lines = render_sessions(&recent_sessions(&gateway, 10).await.expect("sessions"));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cs_test_2 |"));
        assert!(lines[0].contains("520.00 EUR"));
        assert!(lines[1].ends_with("lead lead-a"));
    }
}
