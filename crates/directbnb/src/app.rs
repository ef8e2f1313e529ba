//! Wires storage and third-party adapters into services and one HTTP router.

use std::sync::Arc;

use axum::Router;

use crate::access::AccessPolicy;
use crate::catalog::{catalog_router, CatalogRepository, CatalogService, CatalogState};
use crate::checkout::{
    checkout_router, CheckoutService, CheckoutState, PaymentGateway, PaymentReconciler,
    SignatureVerifier, StripeClient, WebhookPayloadRepository, WebhookService,
};
use crate::config::AppConfig;
use crate::deploy::{
    deploy_router, BackgroundDeploys, CommandBuilder, DeployScheduler, DeployState, PagesApi,
    PagesClient, SiteDeployer, ThemeBuilder,
};
use crate::error::AppError;
use crate::leads::{leads_router, LeadRepository, LeadService, LeadsState};
use crate::memory::{
    InMemoryCatalog, InMemoryLeads, InMemoryProperties, InMemorySessions, InMemorySite,
    InMemoryUsers, InMemoryWebhookPayloads,
};
use crate::properties::{
    properties_router, BackgroundScrapes, HttpListingScraper, ListingScraper, PropertiesState,
    PropertyRepository, PropertyService, ScrapeJob, ScrapeScheduler,
};
use crate::site::{site_router, SiteRepository, SiteService, SiteState};
use crate::users::{users_router, LogMailer, Mailer, UserRepository, UserService};
use crate::wizard::{wizard_router, SessionStore, WizardRouterState, WizardService};

pub const DEFAULT_FROM_EMAIL: &str = "DirectBnB <hello@directbnb.com>";

/// Storage and outbound integrations the services are built on.
pub struct Adapters {
    pub catalog: Arc<dyn CatalogRepository>,
    pub users: Arc<dyn UserRepository>,
    pub sites: Arc<dyn SiteRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub webhooks: Arc<dyn WebhookPayloadRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub scraper: Arc<dyn ListingScraper>,
    pub pages: Arc<dyn PagesApi>,
    pub builder: Arc<dyn ThemeBuilder>,
}

impl Adapters {
    /// In-memory storage with the real Stripe, scraper, Cloudflare and build adapters.
    pub fn in_memory(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            catalog: Arc::new(InMemoryCatalog::default()),
            users: Arc::new(InMemoryUsers::default()),
            sites: Arc::new(InMemorySite::default()),
            properties: Arc::new(InMemoryProperties::default()),
            leads: Arc::new(InMemoryLeads::default()),
            webhooks: Arc::new(InMemoryWebhookPayloads::default()),
            sessions: Arc::new(InMemorySessions::default()),
            mailer: Arc::new(LogMailer::new(DEFAULT_FROM_EMAIL)),
            gateway: Arc::new(StripeClient::new(&config.stripe)?),
            scraper: Arc::new(HttpListingScraper::new(&config.scraper)?),
            pages: Arc::new(PagesClient::new(&config.cloudflare)?),
            builder: Arc::new(CommandBuilder::new(config.theme.build_command.clone())),
        })
    }
}

/// Every service of the application, sharing one set of adapters.
#[derive(Clone)]
pub struct Services {
    pub access: AccessPolicy,
    pub catalog: Arc<CatalogService>,
    pub users: Arc<UserService>,
    pub sites: Arc<SiteService>,
    pub properties: Arc<PropertyService>,
    pub leads: Arc<LeadService>,
    pub checkout: Arc<CheckoutService>,
    pub webhooks: Arc<WebhookService>,
    pub wizard: Arc<WizardService>,
    pub deployer: Arc<SiteDeployer>,
    pub scrapes: Arc<dyn ScrapeScheduler>,
    pub deploys: Arc<dyn DeployScheduler>,
}

impl Services {
    pub fn new(config: &AppConfig, adapters: Adapters) -> Self {
        let access = AccessPolicy::new(config.site.admin_token.as_deref());
        let catalog = Arc::new(CatalogService::new(adapters.catalog.clone()));
        let users = Arc::new(UserService::new(
            adapters.users.clone(),
            adapters.mailer.clone(),
            config.site.clone(),
        ));
        let properties = Arc::new(PropertyService::new(
            adapters.properties.clone(),
            adapters.users.clone(),
        ));

        let scrape_job = ScrapeJob::new(adapters.scraper.clone(), properties.clone());
        let scrapes: Arc<dyn ScrapeScheduler> =
            Arc::new(BackgroundScrapes::new(Arc::new(scrape_job)));
        let sites = Arc::new(SiteService::new(
            adapters.sites.clone(),
            config.site.clone(),
            scrapes.clone(),
        ));

        let checkout = Arc::new(CheckoutService::new(
            adapters.leads.clone(),
            adapters.catalog.clone(),
            adapters.gateway.clone(),
            config.site.clone(),
            config.stripe.currency.clone(),
        ));
        let leads = Arc::new(LeadService::new(
            adapters.leads.clone(),
            adapters.catalog.clone(),
            adapters.sites.clone(),
            adapters.users.clone(),
            checkout.clone(),
            config.site.clone(),
        ));

        let reconciler = Arc::new(PaymentReconciler::new(
            adapters.leads.clone(),
            catalog.clone(),
            users.clone(),
            adapters.mailer.clone(),
            config.stripe.currency.clone(),
        ));
        let webhooks = Arc::new(WebhookService::new(
            SignatureVerifier::new(
                config.stripe.webhook_secret.clone(),
                config.stripe.webhook_tolerance_secs,
            ),
            adapters.webhooks.clone(),
            reconciler,
        ));

        let wizard = Arc::new(WizardService::new(
            adapters.sessions.clone(),
            adapters.sites.clone(),
            adapters.users.clone(),
            catalog.clone(),
            leads.clone(),
            checkout.clone(),
        ));

        let deployer = Arc::new(SiteDeployer::new(
            adapters.properties.clone(),
            adapters.sites.clone(),
            leads.clone(),
            adapters.pages.clone(),
            adapters.builder.clone(),
            config.theme.clone(),
        ));
        let deploys: Arc<dyn DeployScheduler> = Arc::new(BackgroundDeploys::new(deployer.clone()));

        Self {
            access,
            catalog,
            users,
            sites,
            properties,
            leads,
            checkout,
            webhooks,
            wizard,
            deployer,
            scrapes,
            deploys,
        }
    }

    /// All public routes, without health and metrics endpoints.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(catalog_router(CatalogState {
                service: self.catalog.clone(),
                access: self.access.clone(),
            }))
            .merge(site_router(SiteState {
                service: self.sites.clone(),
                access: self.access.clone(),
            }))
            .merge(leads_router(LeadsState {
                service: self.leads.clone(),
                access: self.access.clone(),
            }))
            .merge(checkout_router(CheckoutState {
                checkout: self.checkout.clone(),
                webhooks: self.webhooks.clone(),
            }))
            .merge(users_router(self.users.clone()))
            .merge(wizard_router(WizardRouterState {
                service: self.wizard.clone(),
                access: self.access.clone(),
            }))
            .merge(properties_router(PropertiesState {
                service: self.properties.clone(),
                access: self.access.clone(),
            }))
            .merge(deploy_router(DeployState {
                deployer: self.deployer.clone(),
                scheduler: self.deploys.clone(),
                access: self.access.clone(),
            }))
    }
}
