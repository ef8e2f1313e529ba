use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tower::ServiceExt;
use url::Url;

use super::domain::{LeadId, LeadPatch, LeadSubmission, OptionPatch, OptionSubmission};
use super::router::{leads_router, LeadsState};
use super::service::{LeadError, LeadService};
use crate::access::AccessPolicy;
use crate::catalog::{
    CatalogService, Frequency, NewPackage, NewPromotion, Package, PackageLabel,
};
use crate::checkout::{CheckoutError, CheckoutService};
use crate::config::SiteConfig;
use crate::memory::{
    InMemoryCatalog, InMemoryLeads, InMemorySite, InMemoryUsers, RecordingGateway,
};
use crate::site::ThemeId;
use crate::users::{User, UserId, UserRepository};

const ADMIN_TOKEN: &str = "leads-admin";

struct Fixture {
    service: Arc<LeadService>,
    catalog: Arc<CatalogService>,
    users: Arc<InMemoryUsers>,
    gateway: Arc<RecordingGateway>,
}

fn site() -> SiteConfig {
    SiteConfig {
        site_url: Url::parse("https://directbnb.example").expect("url"),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        email_blacklist: vec!["mailinator.com".to_string()],
        verification_token_ttl_hours: 24,
    }
}

fn build() -> Fixture {
    let leads = Arc::new(InMemoryLeads::default());
    let catalog_repo = Arc::new(InMemoryCatalog::default());
    let users = Arc::new(InMemoryUsers::default());
    let gateway = Arc::new(RecordingGateway::default());
    let checkout = Arc::new(CheckoutService::new(
        leads.clone(),
        catalog_repo.clone(),
        gateway.clone(),
        site(),
        "eur",
    ));
    let service = Arc::new(LeadService::new(
        leads,
        catalog_repo.clone(),
        Arc::new(InMemorySite::default()),
        users.clone(),
        checkout,
        site(),
    ));
    Fixture {
        service,
        catalog: Arc::new(CatalogService::new(catalog_repo)),
        users,
        gateway,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, day).expect("valid date")
}

fn submission(email: &str) -> LeadSubmission {
    LeadSubmission {
        email: email.to_string(),
        first_name: "Marta".to_string(),
        last_name: "Silva".to_string(),
        listing_urls: Some(vec!["https://www.airbnb.com/rooms/1".to_string()]),
        ..LeadSubmission::default()
    }
}

fn package(catalog: &CatalogService, name: &str, amount: &str, label: PackageLabel) -> Package {
    catalog
        .create_package(NewPackage {
            name: name.to_string(),
            currency: "EUR".to_string(),
            amount: amount.parse().expect("decimal"),
            description: None,
            frequency: Frequency::OneTime,
            label,
            extra_info: Map::new(),
        })
        .expect("package stored")
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[test]
fn register_collects_every_field_error() {
    let fixture = build();
    let mut bad = submission("not-an-email");
    bad.first_name = "  ".to_string();
    bad.confirm_email = Some("bot@example.com".to_string());
    bad.listing_urls = Some(vec!["https://ok.example".to_string(), "ftp://x".to_string()]);
    bad.theme = Some(ThemeId(999));

    match fixture.service.register(bad, now()) {
        Err(LeadError::Validation(errors)) => {
            assert_eq!(
                errors.get("confirm_email"),
                Some(&["Invalid submission.".to_string()][..])
            );
            assert!(errors.contains("email"));
            assert!(errors.contains("first_name"));
            assert_eq!(
                errors.get("listing_urls"),
                Some(&["Item 1: Enter a valid URL.".to_string()][..])
            );
            assert_eq!(
                errors.get("theme"),
                Some(&["Invalid pk \"999\" - object does not exist.".to_string()][..])
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn register_rejects_blacklisted_domains_and_existing_users() {
    let fixture = build();
    match fixture.service.register(submission("guest@eu.mailinator.com"), now()) {
        Err(LeadError::Validation(errors)) => assert_eq!(
            errors.get("email"),
            Some(
                &["This email domain has been blacklisted. Please use a different email address."
                    .to_string()][..]
            )
        ),
        other => panic!("expected blacklist error, got {other:?}"),
    }

    fixture
        .users
        .insert(User {
            id: UserId(501),
            email: "owner@example.com".to_string(),
            first_name: "Rui".to_string(),
            last_name: "Lopes".to_string(),
            phone_number: None,
            is_active: true,
            is_email_confirmed: true,
            is_staff: false,
            registered_at: now(),
        })
        .expect("user stored");
    match fixture.service.register(submission("Owner@Example.com"), now()) {
        Err(LeadError::Validation(errors)) => assert_eq!(
            errors.get("email"),
            Some(
                &["A user with this email already exists. Login to your portal on \
                   https://directbnb.example."
                    .to_string()][..]
            )
        ),
        other => panic!("expected existing user error, got {other:?}"),
    }
}

#[test]
fn list_filters_by_normalized_email_and_hides_address() {
    let fixture = build();
    fixture
        .service
        .register(submission(" Guest@Example.com "), now())
        .expect("registered");
    fixture
        .service
        .register(submission("other@example.com"), now())
        .expect("registered");

    let leads = fixture.service.list(Some("GUEST@example.com")).expect("list");
    assert_eq!(leads.len(), 1);
    let body = serde_json::to_value(&leads[0]).expect("serializes");
    assert!(body.get("email").is_none());
    assert_eq!(body["first_name"], "Marta");
    assert_eq!(fixture.service.list(None).expect("all").len(), 2);
}

#[test]
fn options_require_matching_promotion() {
    let fixture = build();
    let lead = fixture
        .service
        .register(submission("guest@example.com"), now())
        .expect("registered");
    let builder = package(&fixture.catalog, "Website", "500", PackageLabel::Builder);
    let hosting = package(&fixture.catalog, "Hosting", "120", PackageLabel::Hosting);
    let promotion = fixture
        .catalog
        .create_promotion(NewPromotion {
            package: builder.id,
            discount_percentage: 20,
            units_available: None,
            start_date: date(1),
            end_date: date(31),
            promotion_code: None,
        })
        .expect("promotion");

    let wrong = OptionSubmission {
        lead_registration: lead.id,
        package: hosting.id,
        promotion: Some(promotion.id),
    };
    match fixture.service.add_option(wrong, now()) {
        Err(LeadError::Validation(errors)) => assert_eq!(
            errors.get("promotion"),
            Some(&["Promotion does not apply to the selected package.".to_string()][..])
        ),
        other => panic!("expected promotion error, got {other:?}"),
    }

    let missing_lead = OptionSubmission {
        lead_registration: LeadId::new(),
        package: builder.id,
        promotion: None,
    };
    match fixture.service.add_option(missing_lead, now()) {
        Err(LeadError::Validation(errors)) => assert!(errors.contains("lead_registration")),
        other => panic!("expected missing lead error, got {other:?}"),
    }

    let option = fixture
        .service
        .add_option(
            OptionSubmission {
                lead_registration: lead.id,
                package: builder.id,
                promotion: Some(promotion.id),
            },
            now(),
        )
        .expect("option stored");
    assert_eq!(
        fixture.service.list_options(Some(&lead.id)).expect("options"),
        vec![option]
    );
}

#[tokio::test]
async fn completing_a_lead_opens_checkout_and_locks_options() {
    let fixture = build();
    let lead = fixture
        .service
        .register(submission("guest@example.com"), now())
        .expect("registered");
    let builder = package(&fixture.catalog, "Website", "500", PackageLabel::Builder);
    let promotion = fixture
        .catalog
        .create_promotion(NewPromotion {
            package: builder.id,
            discount_percentage: 20,
            units_available: Some(3),
            start_date: date(1),
            end_date: date(31),
            promotion_code: None,
        })
        .expect("promotion");
    let option = fixture
        .service
        .add_option(
            OptionSubmission {
                lead_registration: lead.id,
                package: builder.id,
                promotion: Some(promotion.id),
            },
            now(),
        )
        .expect("option");

    let patch = LeadPatch {
        completed_at: Some(Some(now())),
        ..LeadPatch::default()
    };
    let view = fixture
        .service
        .update(&lead.id, patch, now())
        .await
        .expect("updated");
    assert_eq!(
        view.checkout_url.as_deref(),
        Some("https://checkout.stripe.test/c/pay/cs_test_1")
    );
    assert_eq!(view.completed_at, Some(now()));

    let requests = fixture.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].customer_email, "guest@example.com");
    assert_eq!(requests[0].client_reference_id, lead.id.to_string());
    assert_eq!(requests[0].line_items[0].unit_amount, 40_000);
    assert_eq!(requests[0].line_items[0].currency, "eur");
    assert_eq!(
        requests[0].success_url,
        format!("https://directbnb.example/builder/checkout_success/{}", lead.id)
    );

    assert!(matches!(
        fixture
            .service
            .update_option(option.id, OptionPatch::default(), now()),
        Err(LeadError::Completed)
    ));
}

#[tokio::test]
async fn completion_checks_out_with_the_patched_email() {
    let fixture = build();
    let lead = fixture
        .service
        .register(submission("old@example.com"), now())
        .expect("registered");
    let builder = package(&fixture.catalog, "Website", "500", PackageLabel::Builder);
    fixture
        .service
        .add_option(
            OptionSubmission {
                lead_registration: lead.id,
                package: builder.id,
                promotion: None,
            },
            now(),
        )
        .expect("option");

    let patch = LeadPatch {
        email: Some(" New@Example.com ".to_string()),
        completed_at: Some(Some(now())),
        ..LeadPatch::default()
    };
    let view = fixture
        .service
        .update(&lead.id, patch, now())
        .await
        .expect("updated");

    let requests = fixture.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].customer_email, "new@example.com");
    assert_eq!(
        fixture.service.fetch(&lead.id).expect("lead").email,
        "new@example.com"
    );
    let charged = view.registration_options[0]
        .charged
        .as_ref()
        .expect("price frozen by checkout");
    assert_eq!(charged.amount, "500".parse().expect("decimal"));
    assert_eq!(charged.discount_percentage, None);
}

#[tokio::test]
async fn completing_without_options_leaves_lead_open() {
    let fixture = build();
    let lead = fixture
        .service
        .register(submission("guest@example.com"), now())
        .expect("registered");

    let patch = LeadPatch {
        completed_at: Some(Some(now())),
        ..LeadPatch::default()
    };
    let result = fixture.service.update(&lead.id, patch, now()).await;
    assert!(matches!(
        result,
        Err(LeadError::Checkout(CheckoutError::EmptyCart))
    ));
    assert!(fixture
        .service
        .fetch(&lead.id)
        .expect("lead")
        .completed_at
        .is_none());
}

#[tokio::test]
async fn lead_detail_is_admin_only_and_updates_validate() {
    let fixture = build();
    let router = leads_router(LeadsState {
        service: fixture.service.clone(),
        access: AccessPolicy::new(Some(ADMIN_TOKEN)),
    });

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/builder/leads")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": "guest@example.com",
                        "first_name": "Marta",
                        "last_name": "Silva"
                    })
                    .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let id = created["id"].as_str().expect("lead id").to_string();

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/builder/leads/{id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/builder/leads/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::patch(format!("/api/v1/builder/leads/{id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "email": "broken" }).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["email"][0], "Enter a valid email address.");
}
