use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use super::bundle::DeploymentBundle;
use super::deployer::{DeployRequest, DeployScheduler, SiteDeployer, ThemeBuilder};
use super::pages::{PagesApi, PagesDeployment};
use super::router::{deploy_router, DeployState};
use super::DeployError;
use crate::access::AccessPolicy;
use crate::checkout::CheckoutService;
use crate::config::{SiteConfig, ThemeBuildConfig};
use crate::leads::{LeadDraft, LeadId, LeadService};
use crate::memory::{
    InMemoryCatalog, InMemoryLeads, InMemoryProperties, InMemorySite, InMemoryUsers,
    RecordingGateway,
};
use crate::properties::{Property, PropertyContent, PropertyId, PropertyRepository};
use crate::users::UserId;

const ADMIN_TOKEN: &str = "deploy-admin";

#[derive(Default)]
struct FakePages {
    projects: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, Vec<String>)>>,
    domains: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl PagesApi for FakePages {
    async fn project_exists(&self, project: &str) -> Result<bool, DeployError> {
        Ok(self
            .projects
            .lock()
            .expect("pages mutex")
            .iter()
            .any(|existing| existing == project))
    }

    async fn create_project(&self, project: &str) -> Result<(), DeployError> {
        self.projects
            .lock()
            .expect("pages mutex")
            .push(project.to_string());
        Ok(())
    }

    async fn upload_deployment(
        &self,
        project: &str,
        bundle: &DeploymentBundle,
    ) -> Result<PagesDeployment, DeployError> {
        let paths = bundle.files.iter().map(|file| file.path.clone()).collect();
        let mut uploads = self.uploads.lock().expect("pages mutex");
        uploads.push((project.to_string(), paths));
        Ok(PagesDeployment {
            id: format!("dep-{}", uploads.len()),
            url: Some(format!("https://{}.{project}.pages.dev", uploads.len())),
            ..PagesDeployment::default()
        })
    }

    async fn configure_domain(&self, project: &str, domain: &str) -> Result<(), DeployError> {
        self.domains
            .lock()
            .expect("pages mutex")
            .push((project.to_string(), domain.to_string()));
        Ok(())
    }

    async fn deployment_status(
        &self,
        _project: &str,
        deployment_id: &str,
    ) -> Result<PagesDeployment, DeployError> {
        Ok(PagesDeployment {
            id: deployment_id.to_string(),
            ..PagesDeployment::default()
        })
    }
}

/// Writes a one-page build after `failures` failed attempts.
struct FakeBuilder {
    failures: u32,
    calls: AtomicU32,
}

impl FakeBuilder {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ThemeBuilder for FakeBuilder {
    async fn build(&self, theme_dir: &Path) -> Result<(), DeployError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DeployError::Build("bun exited with 1".to_string()));
        }
        let dist = theme_dir.join("dist");
        tokio::fs::create_dir_all(dist.join("assets")).await?;
        tokio::fs::write(dist.join("index.html"), "<h1>Casa Azul</h1>").await?;
        tokio::fs::write(dist.join("assets").join("app.js"), "console.log(1)").await?;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    requests: Mutex<Vec<DeployRequest>>,
}

impl DeployScheduler for RecordingScheduler {
    fn schedule(&self, request: DeployRequest) -> Result<(), DeployError> {
        self.requests.lock().expect("scheduler mutex").push(request);
        Ok(())
    }
}

struct Fixture {
    deployer: Arc<SiteDeployer>,
    leads: Arc<LeadService>,
    pages: Arc<FakePages>,
    builder: Arc<FakeBuilder>,
    theme_dir: TempDir,
    property: PropertyId,
    lead: LeadId,
}

fn site() -> SiteConfig {
    SiteConfig {
        site_url: Url::parse("https://directbnb.example").expect("url"),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        email_blacklist: Vec::new(),
        verification_token_ttl_hours: 24,
    }
}

fn build(builder: FakeBuilder) -> Fixture {
    let theme_dir = tempfile::tempdir().expect("theme dir");
    let leads_repo = Arc::new(InMemoryLeads::default());
    let catalog_repo = Arc::new(InMemoryCatalog::default());
    let sites = Arc::new(InMemorySite::default());
    let checkout = Arc::new(CheckoutService::new(
        leads_repo.clone(),
        catalog_repo.clone(),
        Arc::new(RecordingGateway::default()),
        site(),
        "eur",
    ));
    let leads = Arc::new(LeadService::new(
        leads_repo,
        catalog_repo,
        sites.clone(),
        Arc::new(InMemoryUsers::default()),
        checkout,
        site(),
    ));
    let lead = leads
        .save_draft(
            None,
            LeadDraft {
                email: "ana@example.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Silva".to_string(),
                phone_number: None,
                listing_urls: Vec::new(),
                domain_name: Some("casa-azul.pt".to_string()),
                theme: None,
                color_scheme: None,
                user: None,
            },
            Utc::now(),
        )
        .expect("lead stored");

    let properties = Arc::new(InMemoryProperties::default());
    let property = properties
        .insert(Property {
            id: PropertyId(1),
            owner: UserId(1),
            content: PropertyContent {
                title: Some("Casa Azul".to_string()),
                ..PropertyContent::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .expect("property stored");

    let pages = Arc::new(FakePages::default());
    let builder = Arc::new(builder);
    let deployer = Arc::new(
        SiteDeployer::new(
            properties,
            sites,
            leads.clone(),
            pages.clone(),
            builder.clone(),
            ThemeBuildConfig {
                theme_dir: theme_dir.path().to_path_buf(),
                build_command: "bun run build".to_string(),
            },
        )
        .with_retry_policy(2, Duration::ZERO),
    );
    Fixture {
        deployer,
        leads,
        pages,
        builder,
        theme_dir,
        property: property.id,
        lead: lead.id,
    }
}

fn request(fixture: &Fixture) -> DeployRequest {
    DeployRequest {
        property: fixture.property,
        lead: fixture.lead,
    }
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[test]
fn check_rejects_unknown_records() {
    let fixture = build(FakeBuilder::new(0));
    assert!(fixture.deployer.check(&request(&fixture)).is_ok());

    let missing_property = DeployRequest {
        property: PropertyId(99),
        lead: fixture.lead,
    };
    assert!(matches!(
        fixture.deployer.check(&missing_property),
        Err(DeployError::PropertyNotFound(PropertyId(99)))
    ));

    let missing_lead = DeployRequest {
        property: fixture.property,
        lead: LeadId::new(),
    };
    assert!(matches!(
        fixture.deployer.check(&missing_lead),
        Err(DeployError::LeadNotFound(_))
    ));
}

#[tokio::test]
async fn deploy_exports_builds_uploads_and_records_extras() {
    let fixture = build(FakeBuilder::new(0));
    let record = fixture
        .deployer
        .build_and_deploy(&request(&fixture))
        .await
        .expect("deployed");

    let project = format!("property-{}", fixture.lead);
    assert_eq!(record.project, project);
    assert_eq!(record.deployment_id, "dep-1");

    let data_file = fixture
        .theme_dir
        .path()
        .join("src")
        .join("data")
        .join(format!("property-{}.json", fixture.lead));
    assert!(data_file.is_file());

    assert_eq!(
        fixture.pages.projects.lock().expect("pages mutex").clone(),
        vec![project.clone()]
    );
    let uploads = fixture.pages.uploads.lock().expect("pages mutex").clone();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].1.contains(&"/index.html".to_string()));
    assert!(uploads[0].1.contains(&"/assets/app.js".to_string()));
    assert_eq!(
        fixture.pages.domains.lock().expect("pages mutex").clone(),
        vec![(project.clone(), "casa-azul.pt".to_string())]
    );

    let lead = fixture.leads.fetch(&fixture.lead).expect("lead");
    assert_eq!(lead.extra_requirements["cloudflare_project"], json!(project));
    assert_eq!(lead.extra_requirements["deployment_id"], json!("dep-1"));
    assert!(lead.extra_requirements.contains_key("deployment_url"));
}

#[tokio::test]
async fn redeploy_reuses_existing_project() {
    let fixture = build(FakeBuilder::new(0));
    fixture
        .deployer
        .build_and_deploy(&request(&fixture))
        .await
        .expect("first deploy");
    let second = fixture
        .deployer
        .build_and_deploy(&request(&fixture))
        .await
        .expect("second deploy");

    assert_eq!(second.deployment_id, "dep-2");
    assert_eq!(fixture.pages.projects.lock().expect("pages mutex").len(), 1);
}

#[tokio::test]
async fn run_retries_build_failures() {
    let fixture = build(FakeBuilder::new(2));
    let record = fixture
        .deployer
        .run(&request(&fixture))
        .await
        .expect("third attempt succeeds");

    assert_eq!(record.deployment_id, "dep-1");
    assert_eq!(fixture.builder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn run_stops_after_max_retries() {
    let fixture = build(FakeBuilder::new(10));
    let result = fixture.deployer.run(&request(&fixture)).await;

    assert!(matches!(result, Err(DeployError::Build(_))));
    assert_eq!(fixture.builder.calls.load(Ordering::SeqCst), 3);
    assert!(fixture.pages.uploads.lock().expect("pages mutex").is_empty());
}

#[tokio::test]
async fn missing_theme_dir_is_not_retried() {
    let fixture = build(FakeBuilder::new(0));
    let request = request(&fixture);
    let Fixture {
        deployer,
        builder,
        theme_dir,
        ..
    } = fixture;
    theme_dir.close().expect("theme dir removed");

    let result = deployer.run(&request).await;
    assert!(matches!(result, Err(DeployError::MissingThemeDir(_))));
    assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn router_validates_and_schedules_deployments() {
    let fixture = build(FakeBuilder::new(0));
    let scheduler = Arc::new(RecordingScheduler::default());
    let router = deploy_router(DeployState {
        deployer: fixture.deployer.clone(),
        scheduler: scheduler.clone(),
        access: AccessPolicy::new(Some(ADMIN_TOKEN)),
    });
    let post = |path: String, body: Value, admin: bool| {
        let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        if admin {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    };
    let path = format!("/api/v1/properties/{}/deploy", fixture.property);

    let response = router
        .clone()
        .oneshot(post(path.clone(), json!({ "lead_id": fixture.lead }), false))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(post(path.clone(), json!({ "lead_id": "not-a-uuid" }), true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["lead_id"][0], "Must be a valid UUID.");

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/properties/99/deploy".to_string(),
            json!({ "lead_id": fixture.lead }),
            true,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(post(path, json!({ "lead_id": fixture.lead }), true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Deployment started.");
    assert_eq!(body["project"], format!("property-{}", fixture.lead));
    assert_eq!(
        scheduler.requests.lock().expect("scheduler mutex").clone(),
        vec![request(&fixture)]
    );
}
