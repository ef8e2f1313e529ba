//! Static site export, theme build and Cloudflare Pages deployment.

pub mod bundle;
pub mod deployer;
pub mod export;
pub mod pages;
pub mod router;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use crate::leads::LeadId;
use crate::properties::PropertyId;
use crate::repository::RepositoryError;

pub use bundle::{BundleFile, DeploymentBundle};
pub use deployer::{
    project_name, BackgroundDeploys, CommandBuilder, DeployRequest, DeployScheduler,
    DeploymentRecord, SiteDeployer, ThemeBuilder,
};
pub use export::ThemeDocument;
pub use pages::{PagesApi, PagesClient, PagesDeployment};
pub use router::{deploy_router, DeployState};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_API_TOKEN must be set")]
    NotConfigured,
    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),
    #[error("lead registration {0} not found")]
    LeadNotFound(LeadId),
    #[error("theme directory {0} does not exist")]
    MissingThemeDir(PathBuf),
    #[error("build output {0} does not exist")]
    MissingBuildOutput(PathBuf),
    #[error("theme data export failed: {0}")]
    Export(String),
    #[error("theme build failed: {0}")]
    Build(String),
    #[error("deployment bundle failed: {0}")]
    Bundle(String),
    #[error("cloudflare rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("cloudflare unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not record deployment on the lead: {0}")]
    Bookkeeping(String),
    #[error("no async runtime available to run the deployment")]
    NoRuntime,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DeployError {
    /// Missing records and configuration will not fix themselves between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DeployError::NotConfigured
                | DeployError::PropertyNotFound(_)
                | DeployError::LeadNotFound(_)
                | DeployError::MissingThemeDir(_)
                | DeployError::NoRuntime
        )
    }
}
