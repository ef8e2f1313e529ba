use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use directbnb::app::{Adapters, Services};
use directbnb::checkout::signature::header_value;
use directbnb::checkout::SIGNATURE_HEADER;
use directbnb::config::{
    AppConfig, AppEnvironment, CloudflareConfig, LogFormat, ScraperConfig, ServerConfig,
    SiteConfig, StripeConfig, TelemetryConfig, ThemeBuildConfig,
};
use directbnb::memory::{OutboxMailer, RecordingGateway};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

const ADMIN_TOKEN: &str = "flow-admin";
const WEBHOOK_SECRET: &str = "whsec_flow";

fn config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Test,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        telemetry: TelemetryConfig {
            log_level: "warn".to_string(),
            format: LogFormat::Compact,
        },
        site: SiteConfig {
            site_url: Url::parse("https://directbnb.example").expect("url"),
            admin_token: Some(ADMIN_TOKEN.to_string()),
            email_blacklist: vec!["mailinator.com".to_string()],
            verification_token_ttl_hours: 72,
        },
        stripe: StripeConfig {
            secret_key: None,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            api_base: "https://api.stripe.test".to_string(),
            webhook_tolerance_secs: 300,
            currency: "eur".to_string(),
            timeout_secs: 80,
        },
        cloudflare: CloudflareConfig {
            account_id: None,
            api_token: None,
            api_base: "https://api.cloudflare.test/client/v4".to_string(),
            timeout_secs: 300,
        },
        scraper: ScraperConfig {
            endpoint: None,
            proxy_url: None,
            timeout_secs: 120,
        },
        theme: ThemeBuildConfig {
            theme_dir: PathBuf::from("themes/theme-mountain"),
            build_command: "bun run build".to_string(),
        },
    }
}

struct App {
    router: Router,
    mailer: Arc<OutboxMailer>,
    gateway: Arc<RecordingGateway>,
}

fn app() -> App {
    let config = config();
    let mailer = Arc::new(OutboxMailer::default());
    let gateway = Arc::new(RecordingGateway::default());
    let mut adapters = Adapters::in_memory(&config).expect("adapters");
    adapters.mailer = mailer.clone();
    adapters.gateway = gateway.clone();
    let services = Services::new(&config, adapters);
    App {
        router: services.router(),
        mailer,
        gateway,
    }
}

fn json_request(method: &str, uri: &str, body: Value, admin: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if admin {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

async fn create_package(router: &Router, name: &str, amount: &str, label: &str) -> u64 {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/v1/packages",
            json!({
                "name": name,
                "currency": "EUR",
                "amount": amount,
                "frequency": 1,
                "label": label
            }),
            true,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "package {name}: {body}");
    body["id"].as_u64().expect("package id")
}

#[tokio::test]
async fn lead_pays_through_stripe_and_verifies_email() {
    let app = app();
    let website = create_package(&app.router, "Website", "500", "Builder").await;
    let hosting = create_package(&app.router, "Hosting", "120", "Hosting").await;

    let (status, lead) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/builder/leads",
            json!({
                "email": "Marta@Example.com",
                "first_name": "Marta",
                "last_name": "Reis",
                "listing_urls": ["https://www.airbnb.com/rooms/123"]
            }),
            false,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "lead: {lead}");
    let lead_id = lead["id"].as_str().expect("lead id").to_string();

    for package in [website, hosting] {
        let (status, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/v1/builder/registration-options",
                json!({ "lead_registration": lead_id, "package": package }),
                false,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "option: {body}");
    }

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/builder/checkout/{lead_id}")))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("https://checkout.stripe.test/c/pay/cs_test_1")
    );
    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].customer_email, "marta@example.com");
    assert_eq!(
        requests[0].success_url,
        format!("https://directbnb.example/builder/checkout_success/{lead_id}")
    );

    let (_, pending) = send(
        &app.router,
        get(&format!("/builder/checkout_success/{lead_id}")),
    )
    .await;
    assert_eq!(pending["status"], "pending");

    let event = json!({
        "id": "evt_flow",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": { "object": {
            "id": "cs_test_1",
            "object": "checkout.session",
            "client_reference_id": lead_id
        } }
    })
    .to_string();
    let signature = header_value(WEBHOOK_SECRET, Utc::now().timestamp(), event.as_bytes());
    let webhook = Request::post("/api/v1/builder/stripe-webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(event))
        .expect("request builds");
    let (status, body) = send(&app.router, webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");

    let (_, paid) = send(
        &app.router,
        get(&format!("/builder/checkout_success/{lead_id}")),
    )
    .await;
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["lead"]["paid_options"], 2);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["marta@example.com".to_string()]);
    assert!(sent[0].text_body.contains("Total: 620.00 EUR"));

    let marker = "/users/verify-email/";
    let start = sent[0]
        .text_body
        .find(marker)
        .expect("verification link in email");
    let path: String = sent[0].text_body[start..]
        .chars()
        .take_while(|ch| !ch.is_whitespace())
        .collect();
    let (status, body) = send(&app.router, get(&path)).await;
    assert_eq!(status, StatusCode::OK, "verify: {body}");
    assert_eq!(body["status"], "confirmed");

    let (_, body) = send(&app.router, get(&path)).await;
    assert_eq!(body["status"], "already_confirmed");

    let (status, _) = send(
        &app.router,
        get(&format!("/builder/checkout/{lead_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn public_catalog_groups_packages_by_label() {
    let app = app();
    create_package(&app.router, "Website", "500", "Builder").await;
    create_package(&app.router, "Live reviews", "30", "Add-on").await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/packages",
            json!({ "name": "Sneaky", "amount": "1", "frequency": 1, "label": "Builder" }),
            false,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, get("/api/v1/packages")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Builder"][0]["name"], "Website");
    assert_eq!(body["Add-on"][0]["name"], "Live reviews");
}

#[tokio::test]
async fn unsigned_webhooks_are_rejected() {
    let app = app();
    let webhook = Request::post("/api/v1/builder/stripe-webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"type":"checkout.session.completed"}"#))
        .expect("request builds");
    let (status, body) = send(&app.router, webhook).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing signature");
    assert!(app.mailer.sent().is_empty());
}
