use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use super::router::{site_router, SiteState};
use super::service::{ColorSchemeInput, SiteError, SiteService, ThemeInput, WebsiteInput};
use crate::access::{AccessPolicy, Principal, AUTHENTICATED_USER_HEADER};
use crate::config::SiteConfig;
use crate::memory::InMemorySite;
use crate::properties::{ScrapeError, ScrapeRequest, ScrapeScheduler};
use crate::users::UserId;

const ADMIN_TOKEN: &str = "site-admin";

#[derive(Default)]
struct RecordingScheduler {
    requests: Mutex<Vec<ScrapeRequest>>,
}

impl RecordingScheduler {
    fn requests(&self) -> Vec<ScrapeRequest> {
        self.requests.lock().expect("scheduler mutex").clone()
    }
}

impl ScrapeScheduler for RecordingScheduler {
    fn schedule(&self, request: ScrapeRequest) -> Result<(), ScrapeError> {
        self.requests.lock().expect("scheduler mutex").push(request);
        Ok(())
    }
}

fn site() -> SiteConfig {
    SiteConfig {
        site_url: Url::parse("https://directbnb.example").expect("url"),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        email_blacklist: Vec::new(),
        verification_token_ttl_hours: 24,
    }
}

fn build() -> (Arc<SiteService>, Arc<RecordingScheduler>) {
    let scheduler = Arc::new(RecordingScheduler::default());
    let service = Arc::new(SiteService::new(
        Arc::new(InMemorySite::default()),
        site(),
        scheduler.clone(),
    ));
    (service, scheduler)
}

fn theme(name: &str) -> ThemeInput {
    ThemeInput {
        name: Some(name.to_string()),
        ..ThemeInput::default()
    }
}

fn scheme(name: &str) -> ColorSchemeInput {
    ColorSchemeInput {
        name: Some(name.to_string()),
        internal_name: None,
        theme_colors: Some(json!([{ "name": "primary", "value": "#0f766e" }])),
    }
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[test]
fn theme_defaults_preview_link_and_rejects_duplicates() {
    let (service, _) = build();

    let created = service.create_theme(theme("Mountain")).expect("theme");
    assert_eq!(
        created.preview_link.as_deref(),
        Some("mountain_preview.directbnb.example")
    );

    match service.create_theme(theme("Mountain")) {
        Err(SiteError::Validation(errors)) => assert_eq!(
            errors.get("name"),
            Some(&["theme choices with this name already exists.".to_string()][..])
        ),
        other => panic!("expected duplicate name error, got {other:?}"),
    }
    match service.create_theme(theme("   ")) {
        Err(SiteError::Validation(errors)) => assert!(errors.contains("name")),
        other => panic!("expected blank name error, got {other:?}"),
    }
}

#[test]
fn color_scheme_rejects_unknown_color_names() {
    let (service, _) = build();
    let input = ColorSchemeInput {
        name: Some("Sunset".to_string()),
        internal_name: None,
        theme_colors: Some(json!([{ "name": "tertiary", "value": "#000" }])),
    };
    match service.create_color_scheme(input) {
        Err(SiteError::Validation(errors)) => assert_eq!(
            errors.get("theme_colors"),
            Some(&["Invalid color name: tertiary".to_string()][..])
        ),
        other => panic!("expected theme colors error, got {other:?}"),
    }

    let stored = service.create_color_scheme(scheme("Forest")).expect("scheme");
    assert_eq!(stored.theme_colors.len(), 1);
}

#[test]
fn websites_are_scoped_to_their_owner() {
    let (service, _) = build();
    let theme = service.create_theme(theme("Coast")).expect("theme");
    let scheme = service.create_color_scheme(scheme("Ocean")).expect("scheme");
    let owner = Principal::User(UserId(7));
    let stranger = Principal::User(UserId(8));

    let website = service
        .create_website(
            owner,
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                airbnb_listing_url: Some("https://www.airbnb.com/rooms/1".to_string()),
                ..WebsiteInput::default()
            },
        )
        .expect("website");

    assert_eq!(service.websites(owner).expect("list").len(), 1);
    assert!(service.websites(stranger).expect("list").is_empty());
    assert_eq!(service.websites(Principal::Admin).expect("list").len(), 1);
    assert!(matches!(
        service.website(stranger, website.id),
        Err(SiteError::NotFound)
    ));
    assert!(matches!(
        service.websites(Principal::Anonymous),
        Err(SiteError::Unauthenticated)
    ));

    let configuration = service.configuration(owner, website.id).expect("config");
    assert_eq!(
        configuration.theme_detail.map(|detail| detail.name),
        Some("Coast".to_string())
    );
}

#[test]
fn website_validation_reports_missing_and_foreign_urls() {
    let (service, _) = build();
    let input = WebsiteInput {
        airbnb_listing_url: Some("https://example.com/rooms/1".to_string()),
        booking_listing_url: Some("https://airbnb.com/hotel".to_string()),
        ..WebsiteInput::default()
    };
    match service.create_website(Principal::User(UserId(1)), input) {
        Err(SiteError::Validation(errors)) => {
            assert!(errors.contains("theme"));
            assert!(errors.contains("color_scheme"));
            assert!(errors.contains("airbnb_listing_url"));
            assert!(errors.contains("booking_listing_url"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn themes_in_use_cannot_be_deleted() {
    let (service, _) = build();
    let theme = service.create_theme(theme("Lake")).expect("theme");
    let scheme = service.create_color_scheme(scheme("Moss")).expect("scheme");
    service
        .create_website(
            Principal::User(UserId(3)),
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                ..WebsiteInput::default()
            },
        )
        .expect("website");

    assert!(matches!(
        service.delete_theme(theme.id),
        Err(SiteError::InUse("theme"))
    ));
    assert!(matches!(
        service.delete_color_scheme(scheme.id),
        Err(SiteError::InUse("color scheme"))
    ));
}

#[test]
fn scrape_airbnb_queues_request_for_owner() {
    let (service, scheduler) = build();
    let theme = service.create_theme(theme("Desert")).expect("theme");
    let scheme = service.create_color_scheme(scheme("Sand")).expect("scheme");
    let owner = Principal::User(UserId(11));
    let with_url = service
        .create_website(
            owner,
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                airbnb_listing_url: Some("https://www.airbnb.com/rooms/42".to_string()),
                ..WebsiteInput::default()
            },
        )
        .expect("website");
    let without_url = service
        .create_website(
            owner,
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                ..WebsiteInput::default()
            },
        )
        .expect("website");

    service.scrape_airbnb(owner, with_url.id).expect("queued");
    assert_eq!(
        scheduler.requests(),
        vec![ScrapeRequest {
            owner: UserId(11),
            listing_url: "https://www.airbnb.com/rooms/42".to_string(),
        }]
    );
    assert!(matches!(
        service.scrape_airbnb(owner, without_url.id),
        Err(SiteError::MissingListingUrl(_))
    ));
}

#[tokio::test]
async fn theme_writes_require_admin_and_reads_are_public() {
    let (service, _) = build();
    let router = site_router(SiteState {
        service,
        access: AccessPolicy::new(Some(ADMIN_TOKEN)),
    });
    let payload = json!({ "name": "Alpine" }).to_string();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/builder/themes")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.clone()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/builder/themes")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .body(Body::from(payload))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::get("/api/v1/builder/themes")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body[0]["name"], "Alpine");
}

#[tokio::test]
async fn websites_require_an_authenticated_caller() {
    let (service, _) = build();
    let theme = service.create_theme(theme("Valley")).expect("theme");
    let scheme = service.create_color_scheme(scheme("Meadow")).expect("scheme");
    let router = site_router(SiteState {
        service,
        access: AccessPolicy::new(Some(ADMIN_TOKEN)),
    });
    let payload = json!({ "theme": theme.id, "color_scheme": scheme.id }).to_string();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/builder/websites")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.clone()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(
            Request::post("/api/v1/builder/websites")
                .header(header::CONTENT_TYPE, "application/json")
                .header(AUTHENTICATED_USER_HEADER, "5")
                .body(Body::from(payload))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["owner"], 5);
}

#[tokio::test]
async fn booking_scrape_route_reports_missing_url_then_unsupported() {
    let (service, scheduler) = build();
    let theme = service.create_theme(theme("Harbour")).expect("theme");
    let scheme = service.create_color_scheme(scheme("Tide")).expect("scheme");
    let owner = Principal::User(UserId(12));
    let without_url = service
        .create_website(
            owner,
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                ..WebsiteInput::default()
            },
        )
        .expect("website");
    let with_url = service
        .create_website(
            owner,
            WebsiteInput {
                theme: Some(theme.id),
                color_scheme: Some(scheme.id),
                booking_listing_url: Some(
                    "https://www.booking.com/hotel/pt/casa.html".to_string(),
                ),
                ..WebsiteInput::default()
            },
        )
        .expect("website");
    let router = site_router(SiteState {
        service,
        access: AccessPolicy::new(Some(ADMIN_TOKEN)),
    });
    let scrape = |id: u64| {
        Request::post(format!("/api/v1/builder/websites/{id}/scrape-booking"))
            .header(AUTHENTICATED_USER_HEADER, "12")
            .body(Body::empty())
            .expect("request")
    };

    let response = router
        .clone()
        .oneshot(scrape(without_url.id.0))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "No Booking.com listing URL configured");

    let response = router
        .oneshot(scrape(with_url.id.0))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "Booking.com scraping is not supported yet");
    assert!(scheduler.requests().is_empty());
}
