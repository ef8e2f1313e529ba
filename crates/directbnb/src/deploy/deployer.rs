use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::bundle::DeploymentBundle;
use super::export::ThemeDocument;
use super::pages::PagesApi;
use super::DeployError;
use crate::config::ThemeBuildConfig;
use crate::leads::{LeadId, LeadService};
use crate::properties::{PropertyId, PropertyRepository};
use crate::site::SiteRepository;

/// Runs the theme's static build inside its directory.
#[async_trait]
pub trait ThemeBuilder: Send + Sync {
    async fn build(&self, theme_dir: &Path) -> Result<(), DeployError>;
}

/// Builds by spawning the configured command line (`bun run build`).
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    command: String,
}

impl CommandBuilder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ThemeBuilder for CommandBuilder {
    async fn build(&self, theme_dir: &Path) -> Result<(), DeployError> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DeployError::Build("build command is empty".to_string()))?;
        let output = Command::new(program)
            .args(parts)
            .current_dir(theme_dir)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Build(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub property: PropertyId,
    pub lead: LeadId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    pub project: String,
    pub deployment_id: String,
    pub deployment_url: Option<String>,
}

pub fn project_name(lead: &LeadId) -> String {
    format!("property-{lead}")
}

/// Export, build, upload and bookkeeping for one property site.
pub struct SiteDeployer {
    properties: Arc<dyn PropertyRepository>,
    sites: Arc<dyn SiteRepository>,
    leads: Arc<LeadService>,
    pages: Arc<dyn PagesApi>,
    builder: Arc<dyn ThemeBuilder>,
    theme: ThemeBuildConfig,
    max_retries: u32,
    countdown: Duration,
}

impl SiteDeployer {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(120);

    pub fn new(
        properties: Arc<dyn PropertyRepository>,
        sites: Arc<dyn SiteRepository>,
        leads: Arc<LeadService>,
        pages: Arc<dyn PagesApi>,
        builder: Arc<dyn ThemeBuilder>,
        theme: ThemeBuildConfig,
    ) -> Self {
        Self {
            properties,
            sites,
            leads,
            pages,
            builder,
            theme,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            countdown: Self::DEFAULT_COUNTDOWN,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, countdown: Duration) -> Self {
        self.max_retries = max_retries;
        self.countdown = countdown;
        self
    }

    /// Fails fast on unknown ids so callers can answer before scheduling.
    pub fn check(&self, request: &DeployRequest) -> Result<(), DeployError> {
        if self.properties.fetch(request.property)?.is_none() {
            return Err(DeployError::PropertyNotFound(request.property));
        }
        self.leads
            .fetch(&request.lead)
            .map_err(|_| DeployError::LeadNotFound(request.lead))?;
        Ok(())
    }

    pub async fn run(&self, request: &DeployRequest) -> Result<DeploymentRecord, DeployError> {
        let mut attempt = 0;
        loop {
            match self.build_and_deploy(request).await {
                Ok(record) => return Ok(record),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        max_retries = self.max_retries,
                        lead_id = %request.lead,
                        "site deployment failed, retrying"
                    );
                    tokio::time::sleep(self.countdown).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn build_and_deploy(
        &self,
        request: &DeployRequest,
    ) -> Result<DeploymentRecord, DeployError> {
        let property = self
            .properties
            .fetch(request.property)?
            .ok_or(DeployError::PropertyNotFound(request.property))?;
        let lead = self
            .leads
            .fetch(&request.lead)
            .map_err(|_| DeployError::LeadNotFound(request.lead))?;

        let theme_name = match lead.theme {
            Some(id) => self.sites.theme(id)?.map(|theme| theme.name),
            None => None,
        };
        let scheme_name = match lead.color_scheme {
            Some(id) => self.sites.color_scheme(id)?.map(|scheme| scheme.name),
            None => None,
        };

        let theme_dir = self.theme.theme_dir.as_path();
        if !theme_dir.is_dir() {
            return Err(DeployError::MissingThemeDir(theme_dir.to_path_buf()));
        }
        let document = ThemeDocument::new(&property, &lead, theme_name, scheme_name);
        let data_path = ThemeDocument::path_for(theme_dir, &lead);
        document.write(&data_path).await?;
        info!(lead_id = %lead.id, path = %data_path.display(), "theme data exported");

        self.builder.build(theme_dir).await?;
        let bundle = DeploymentBundle::collect(&theme_dir.join("dist"))?;
        if bundle.is_empty() {
            return Err(DeployError::Bundle("build produced no files".to_string()));
        }

        let project = project_name(&lead.id);
        if !self.pages.project_exists(&project).await? {
            self.pages.create_project(&project).await?;
            info!(project = %project, "pages project created");
        }
        let deployment = self.pages.upload_deployment(&project, &bundle).await?;

        if let Some(domain) = lead.domain_name.as_deref() {
            if let Err(err) = self.pages.configure_domain(&project, domain).await {
                warn!(project = %project, domain, error = %err, "custom domain not configured");
            }
        }

        let now = Utc::now();
        let mut extras = vec![
            ("cloudflare_project", Value::String(project.clone())),
            ("deployment_id", Value::String(deployment.id.clone())),
        ];
        if let Some(url) = &deployment.url {
            extras.push(("deployment_url", Value::String(url.clone())));
        }
        for (key, value) in extras {
            self.leads
                .set_extra_requirement(&lead.id, key, value, now)
                .map_err(|err| DeployError::Bookkeeping(err.to_string()))?;
        }

        info!(
            lead_id = %lead.id,
            project = %project,
            deployment_id = %deployment.id,
            files = bundle.files.len(),
            "site deployed"
        );
        Ok(DeploymentRecord {
            project,
            deployment_id: deployment.id,
            deployment_url: deployment.url,
        })
    }
}

/// Hands deploy requests to whatever runs them in the background.
pub trait DeployScheduler: Send + Sync {
    fn schedule(&self, request: DeployRequest) -> Result<(), DeployError>;
}

/// Runs deployments on the ambient tokio runtime.
pub struct BackgroundDeploys {
    deployer: Arc<SiteDeployer>,
}

impl BackgroundDeploys {
    pub fn new(deployer: Arc<SiteDeployer>) -> Self {
        Self { deployer }
    }
}

impl DeployScheduler for BackgroundDeploys {
    fn schedule(&self, request: DeployRequest) -> Result<(), DeployError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| DeployError::NoRuntime)?;
        let deployer = self.deployer.clone();
        handle.spawn(async move {
            match deployer.run(&request).await {
                Ok(record) => info!(
                    lead_id = %request.lead,
                    deployment_id = %record.deployment_id,
                    "background deployment finished"
                ),
                Err(err) => error!(
                    error = %err,
                    lead_id = %request.lead,
                    property_id = %request.property,
                    "site deployment abandoned"
                ),
            }
        });
        Ok(())
    }
}
