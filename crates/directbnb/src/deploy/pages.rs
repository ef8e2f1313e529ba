use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::bundle::DeploymentBundle;
use super::DeployError;
use crate::config::CloudflareConfig;

pub const PRODUCTION_BRANCH: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesDeployment {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub latest_stage: Option<DeploymentStage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStage {
    pub name: String,
    pub status: String,
}

/// Cloudflare Pages operations used by the deployer.
#[async_trait]
pub trait PagesApi: Send + Sync {
    async fn project_exists(&self, project: &str) -> Result<bool, DeployError>;
    async fn create_project(&self, project: &str) -> Result<(), DeployError>;
    async fn upload_deployment(
        &self,
        project: &str,
        bundle: &DeploymentBundle,
    ) -> Result<PagesDeployment, DeployError>;
    async fn configure_domain(&self, project: &str, domain: &str) -> Result<(), DeployError>;
    async fn deployment_status(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> Result<PagesDeployment, DeployError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

/// Cloudflare Pages REST client authenticated with an API token.
#[derive(Debug, Clone)]
pub struct PagesClient {
    client: reqwest::Client,
    account_id: Option<String>,
    api_token: Option<String>,
    api_base: String,
}

impl PagesClient {
    pub fn new(config: &CloudflareConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            account_id: config.account_id.clone(),
            api_token: config.api_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn credentials(&self) -> Result<(&str, &str), DeployError> {
        match (self.account_id.as_deref(), self.api_token.as_deref()) {
            (Some(account), Some(token)) => Ok((account, token)),
            _ => Err(DeployError::NotConfigured),
        }
    }

    fn projects_url(&self, account: &str) -> String {
        format!("{}/accounts/{account}/pages/projects", self.api_base)
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DeployError> {
    let status = response.status();
    let body = response.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|_| DeployError::Api {
        status: status.as_u16(),
        message: body.trim().to_string(),
    })?;
    if !status.is_success() || !envelope.success {
        let message = envelope
            .errors
            .into_iter()
            .map(|error| error.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DeployError::Api {
            status: status.as_u16(),
            message,
        });
    }
    envelope.result.ok_or_else(|| DeployError::Api {
        status: status.as_u16(),
        message: "response carried no result".to_string(),
    })
}

/// Multipart body: the manifest, the branch, then one part per file keyed by digest.
pub fn deployment_form(bundle: &DeploymentBundle) -> Result<Form, DeployError> {
    let manifest = serde_json::to_string(&bundle.manifest())
        .map_err(|err| DeployError::Bundle(err.to_string()))?;
    let mut form = Form::new()
        .text("manifest", manifest)
        .text("branch", PRODUCTION_BRANCH);
    for file in &bundle.files {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.path.trim_start_matches('/').to_string())
            .mime_str(&file.content_type)?;
        form = form.part(file.digest.clone(), part);
    }
    Ok(form)
}

#[async_trait]
impl PagesApi for PagesClient {
    async fn project_exists(&self, project: &str) -> Result<bool, DeployError> {
        let (account, token) = self.credentials()?;
        let response = self
            .client
            .get(format!("{}/{project}", self.projects_url(account)))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        unwrap_envelope::<Value>(response).await.map(|_| true)
    }

    async fn create_project(&self, project: &str) -> Result<(), DeployError> {
        let (account, token) = self.credentials()?;
        let response = self
            .client
            .post(self.projects_url(account))
            .bearer_auth(token)
            .json(&json!({ "name": project, "production_branch": PRODUCTION_BRANCH }))
            .send()
            .await?;
        unwrap_envelope::<Value>(response).await.map(|_| ())
    }

    async fn upload_deployment(
        &self,
        project: &str,
        bundle: &DeploymentBundle,
    ) -> Result<PagesDeployment, DeployError> {
        let (account, token) = self.credentials()?;
        debug!(
            project,
            files = bundle.files.len(),
            bytes = bundle.total_bytes(),
            "uploading pages deployment"
        );
        let response = self
            .client
            .post(format!(
                "{}/{project}/deployments",
                self.projects_url(account)
            ))
            .bearer_auth(token)
            .multipart(deployment_form(bundle)?)
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    async fn configure_domain(&self, project: &str, domain: &str) -> Result<(), DeployError> {
        let (account, token) = self.credentials()?;
        let response = self
            .client
            .post(format!("{}/{project}/domains", self.projects_url(account)))
            .bearer_auth(token)
            .json(&json!({ "name": domain }))
            .send()
            .await?;
        unwrap_envelope::<Value>(response).await.map(|_| ())
    }

    async fn deployment_status(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> Result<PagesDeployment, DeployError> {
        let (account, token) = self.credentials()?;
        let response = self
            .client
            .get(format!(
                "{}/{project}/deployments/{deployment_id}",
                self.projects_url(account)
            ))
            .bearer_auth(token)
            .send()
            .await?;
        unwrap_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_base: String, timeout_secs: u64) -> CloudflareConfig {
        CloudflareConfig {
            account_id: Some("acc".to_string()),
            api_token: Some("cf-token".to_string()),
            api_base,
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn missing_credentials_fail_fast() {
        let mut config = config("http://127.0.0.1:9".to_string(), 300);
        config.api_token = None;
        let client = PagesClient::new(&config).expect("client builds");
        assert!(matches!(
            client.project_exists("property-x").await,
            Err(DeployError::NotConfigured)
        ));
    }

    #[test]
    fn deployment_stage_deserializes() {
        let deployment: PagesDeployment = serde_json::from_value(json!({
            "id": "dep-1",
            "url": "https://abc.property-x.pages.dev",
            "latest_stage": { "name": "deploy", "status": "success" }
        }))
        .expect("deployment parses");
        assert_eq!(deployment.latest_stage.map(|stage| stage.status), Some("success".into()));
    }

    #[tokio::test]
    async fn unresponsive_api_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = PagesClient::new(&config(format!("http://{addr}"), 1)).expect("client builds");
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.project_exists("property-x"),
        )
        .await
        .expect("request gives up on its own");
        assert!(matches!(result, Err(DeployError::Transport(ref err)) if err.is_timeout()));
        silent.abort();
    }
}
