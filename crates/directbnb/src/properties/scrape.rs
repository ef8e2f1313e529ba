use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use super::domain::Property;
use super::import::ScrapedListing;
use super::service::{PropertyError, PropertyService};
use crate::config::ScraperConfig;
use crate::users::UserId;

/// Fetches the raw listing JSON for a listing URL.
#[async_trait]
pub trait ListingScraper: Send + Sync {
    async fn fetch_listing(&self, listing_url: &str) -> Result<Value, ScrapeError>;
}

/// Client for the listing scraper sidecar.
#[derive(Debug, Clone)]
pub struct HttpListingScraper {
    client: reqwest::Client,
    endpoint: Option<String>,
    proxy_url: Option<String>,
}

impl HttpListingScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            proxy_url: config.proxy_url.clone(),
        })
    }
}

#[async_trait]
impl ListingScraper for HttpListingScraper {
    async fn fetch_listing(&self, listing_url: &str) -> Result<Value, ScrapeError> {
        let endpoint = self.endpoint.as_deref().ok_or(ScrapeError::NotConfigured)?;

        let mut query = vec![("url", listing_url), ("language", "en")];
        if let Some(proxy) = self.proxy_url.as_deref() {
            query.push(("proxy_url", proxy));
        }

        let response = self.client.get(endpoint).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub owner: UserId,
    pub listing_url: String,
}

/// Hands scrape requests to whatever runs them in the background.
pub trait ScrapeScheduler: Send + Sync {
    fn schedule(&self, request: ScrapeRequest) -> Result<(), ScrapeError>;
}

/// Scrape then import, retried with a fixed countdown between attempts.
pub struct ScrapeJob {
    scraper: Arc<dyn ListingScraper>,
    properties: Arc<PropertyService>,
    max_retries: u32,
    countdown: Duration,
}

impl ScrapeJob {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(60);

    pub fn new(scraper: Arc<dyn ListingScraper>, properties: Arc<PropertyService>) -> Self {
        Self {
            scraper,
            properties,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            countdown: Self::DEFAULT_COUNTDOWN,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, countdown: Duration) -> Self {
        self.max_retries = max_retries;
        self.countdown = countdown;
        self
    }

    pub async fn run(&self, request: &ScrapeRequest) -> Result<Property, ScrapeError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(property) => return Ok(property),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        max_retries = self.max_retries,
                        listing_url = %request.listing_url,
                        "listing scrape failed, retrying"
                    );
                    tokio::time::sleep(self.countdown).await;
                }
                Err(err) => {
                    return Err(ScrapeError::Exhausted {
                        attempts: attempt + 1,
                        last: err.to_string(),
                    })
                }
            }
        }
    }

    async fn attempt(&self, request: &ScrapeRequest) -> Result<Property, ScrapeError> {
        let raw = self.scraper.fetch_listing(&request.listing_url).await?;
        let listing =
            ScrapedListing::from_value(raw).map_err(|err| ScrapeError::Decode(err.to_string()))?;
        Ok(self.properties.import(request.owner, listing)?)
    }
}

/// Runs scrape jobs on the ambient tokio runtime.
pub struct BackgroundScrapes {
    job: Arc<ScrapeJob>,
}

impl BackgroundScrapes {
    pub fn new(job: Arc<ScrapeJob>) -> Self {
        Self { job }
    }
}

impl ScrapeScheduler for BackgroundScrapes {
    fn schedule(&self, request: ScrapeRequest) -> Result<(), ScrapeError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ScrapeError::NoRuntime)?;
        let job = self.job.clone();
        handle.spawn(async move {
            match job.run(&request).await {
                Ok(property) => info!(
                    property_id = %property.id,
                    owner = %request.owner,
                    "scraped listing stored"
                ),
                Err(err) => error!(
                    error = %err,
                    listing_url = %request.listing_url,
                    "listing scrape abandoned"
                ),
            }
        });
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("SCRAPER_ENDPOINT is not configured")]
    NotConfigured,
    #[error("scraper request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("scraper returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("scraped listing could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Import(#[from] PropertyError),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    #[error("no async runtime available to run the scrape")]
    NoRuntime,
}
