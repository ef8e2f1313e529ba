//! Mutex-guarded in-memory implementations of every storage trait.
//!
//! They back the API binary and the test suites; state lives only as long as
//! the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::{CatalogRepository, Package, PackageId, Promotion, PromotionId};
use crate::checkout::{
    AccountSummary, CheckoutRequest, CheckoutSession, GatewayError, NewWebhookEndpoint,
    PayloadId, PaymentGateway, StripeWebhookPayload, WebhookEndpoint, WebhookPayloadRepository,
};
use crate::leads::{LeadId, LeadRegistration, LeadRepository, OptionId, RegistrationOption};
use crate::properties::{Property, PropertyId, PropertyRepository};
use crate::repository::RepositoryError;
use crate::site::{
    ColorScheme, ColorSchemeId, SiteRepository, Theme, ThemeId, Website, WebsiteId,
};
use crate::users::{MailError, Mailer, OutgoingEmail, User, UserId, UserRepository, UserToken};
use crate::wizard::{SessionStore, WizardState};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default)]
struct CatalogTables {
    packages: BTreeMap<PackageId, Package>,
    promotions: BTreeMap<PromotionId, Promotion>,
}

#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    tables: Arc<Mutex<CatalogTables>>,
}

impl CatalogRepository for InMemoryCatalog {
    fn insert_package(&self, package: Package) -> Result<Package, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let duplicate = tables
            .packages
            .values()
            .any(|existing| existing.id == package.id || existing.name == package.name);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.packages.insert(package.id, package.clone());
        Ok(package)
    }

    fn package(&self, id: PackageId) -> Result<Option<Package>, RepositoryError> {
        Ok(lock(&self.tables)?.packages.get(&id).cloned())
    }

    fn packages(&self) -> Result<Vec<Package>, RepositoryError> {
        Ok(lock(&self.tables)?.packages.values().cloned().collect())
    }

    fn insert_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if !tables.packages.contains_key(&promotion.package_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.promotions.contains_key(&promotion.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.promotions.insert(promotion.id, promotion.clone());
        Ok(promotion)
    }

    fn promotion(&self, id: PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        Ok(lock(&self.tables)?.promotions.get(&id).cloned())
    }

    fn promotions_for(&self, package: PackageId) -> Result<Vec<Promotion>, RepositoryError> {
        Ok(lock(&self.tables)?
            .promotions
            .values()
            .filter(|promotion| promotion.package_id == package)
            .cloned()
            .collect())
    }

    fn consume_unit(&self, id: PromotionId) -> Result<Promotion, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let promotion = tables
            .promotions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(units) = promotion.units_available.as_mut() {
            *units = units.saturating_sub(1);
        }
        Ok(promotion.clone())
    }
}

#[derive(Default)]
struct UserTables {
    users: BTreeMap<UserId, User>,
    tokens: HashMap<Uuid, UserToken>,
}

#[derive(Default, Clone)]
pub struct InMemoryUsers {
    tables: Arc<Mutex<UserTables>>,
}

impl UserRepository for InMemoryUsers {
    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let taken = tables
            .users
            .values()
            .any(|existing| {
                existing.id == user.id || existing.email.eq_ignore_ascii_case(&user.email)
            });
        if taken {
            return Err(RepositoryError::Conflict);
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update(&self, user: User) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.tables)?.users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = email.trim();
        Ok(lock(&self.tables)?
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn insert_token(&self, token: UserToken) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables.tokens.contains_key(&token.token) {
            return Err(RepositoryError::Conflict);
        }
        tables.tokens.insert(token.token, token);
        Ok(())
    }

    fn token(&self, token: &Uuid) -> Result<Option<UserToken>, RepositoryError> {
        Ok(lock(&self.tables)?.tokens.get(token).cloned())
    }

    fn delete_token(&self, token: &Uuid) -> Result<(), RepositoryError> {
        lock(&self.tables)?.tokens.remove(token);
        Ok(())
    }

    fn delete_tokens_for(&self, user: UserId) -> Result<(), RepositoryError> {
        lock(&self.tables)?
            .tokens
            .retain(|_, token| token.user_id != user);
        Ok(())
    }
}

/// Mailer that keeps every message for inspection.
#[derive(Default, Clone)]
pub struct OutboxMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failing: bool,
}

impl OutboxMailer {
    /// Rejects every message with a transport error.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Transport("outbox configured to fail".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("outbox poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

#[derive(Default)]
struct SiteTables {
    themes: BTreeMap<ThemeId, Theme>,
    color_schemes: BTreeMap<ColorSchemeId, ColorScheme>,
    websites: BTreeMap<WebsiteId, Website>,
}

#[derive(Default, Clone)]
pub struct InMemorySite {
    tables: Arc<Mutex<SiteTables>>,
}

impl SiteRepository for InMemorySite {
    fn insert_theme(&self, theme: Theme) -> Result<Theme, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables
            .themes
            .values()
            .any(|existing| existing.id == theme.id || existing.name == theme.name)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.themes.insert(theme.id, theme.clone());
        Ok(theme)
    }

    fn update_theme(&self, theme: Theme) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if !tables.themes.contains_key(&theme.id) {
            return Err(RepositoryError::NotFound);
        }
        if tables
            .themes
            .values()
            .any(|existing| existing.id != theme.id && existing.name == theme.name)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.themes.insert(theme.id, theme);
        Ok(())
    }

    fn delete_theme(&self, id: ThemeId) -> Result<(), RepositoryError> {
        lock(&self.tables)?
            .themes
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn theme(&self, id: ThemeId) -> Result<Option<Theme>, RepositoryError> {
        Ok(lock(&self.tables)?.themes.get(&id).cloned())
    }

    fn themes(&self) -> Result<Vec<Theme>, RepositoryError> {
        Ok(lock(&self.tables)?.themes.values().cloned().collect())
    }

    fn insert_color_scheme(&self, scheme: ColorScheme) -> Result<ColorScheme, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables
            .color_schemes
            .values()
            .any(|existing| existing.id == scheme.id || existing.name == scheme.name)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.color_schemes.insert(scheme.id, scheme.clone());
        Ok(scheme)
    }

    fn update_color_scheme(&self, scheme: ColorScheme) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if !tables.color_schemes.contains_key(&scheme.id) {
            return Err(RepositoryError::NotFound);
        }
        if tables
            .color_schemes
            .values()
            .any(|existing| existing.id != scheme.id && existing.name == scheme.name)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.color_schemes.insert(scheme.id, scheme);
        Ok(())
    }

    fn delete_color_scheme(&self, id: ColorSchemeId) -> Result<(), RepositoryError> {
        lock(&self.tables)?
            .color_schemes
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn color_scheme(&self, id: ColorSchemeId) -> Result<Option<ColorScheme>, RepositoryError> {
        Ok(lock(&self.tables)?.color_schemes.get(&id).cloned())
    }

    fn color_schemes(&self) -> Result<Vec<ColorScheme>, RepositoryError> {
        Ok(lock(&self.tables)?.color_schemes.values().cloned().collect())
    }

    fn insert_website(&self, website: Website) -> Result<Website, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables.websites.contains_key(&website.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.websites.insert(website.id, website.clone());
        Ok(website)
    }

    fn update_website(&self, website: Website) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        match tables.websites.get_mut(&website.id) {
            Some(existing) => {
                *existing = website;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn website(&self, id: WebsiteId) -> Result<Option<Website>, RepositoryError> {
        Ok(lock(&self.tables)?.websites.get(&id).cloned())
    }

    fn websites(&self, owner: Option<UserId>) -> Result<Vec<Website>, RepositoryError> {
        Ok(lock(&self.tables)?
            .websites
            .values()
            .filter(|website| owner.map_or(true, |owner| website.owner == owner))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProperties {
    records: Arc<Mutex<BTreeMap<PropertyId, Property>>>,
}

impl PropertyRepository for InMemoryProperties {
    fn insert(&self, property: Property) -> Result<Property, RepositoryError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&property.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(property.id, property.clone());
        Ok(property)
    }

    fn update(&self, property: Property) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records)?;
        match records.get_mut(&property.id) {
            Some(existing) => {
                *existing = property;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(lock(&self.records)?.get(&id).cloned())
    }

    fn list(&self, owner: Option<UserId>) -> Result<Vec<Property>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|property| owner.map_or(true, |owner| property.owner == owner))
            .cloned()
            .collect())
    }

    fn delete(&self, id: PropertyId) -> Result<(), RepositoryError> {
        lock(&self.records)?
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default)]
struct LeadTables {
    leads: HashMap<LeadId, LeadRegistration>,
    options: BTreeMap<OptionId, RegistrationOption>,
}

#[derive(Default, Clone)]
pub struct InMemoryLeads {
    tables: Arc<Mutex<LeadTables>>,
}

impl LeadRepository for InMemoryLeads {
    fn insert(&self, lead: LeadRegistration) -> Result<LeadRegistration, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    fn update(&self, lead: LeadRegistration) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        match tables.leads.get_mut(&lead.id) {
            Some(existing) => {
                *existing = lead;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRegistration>, RepositoryError> {
        Ok(lock(&self.tables)?.leads.get(id).cloned())
    }

    fn list(&self, email: Option<&str>) -> Result<Vec<LeadRegistration>, RepositoryError> {
        Ok(lock(&self.tables)?
            .leads
            .values()
            .filter(|lead| email.map_or(true, |email| lead.email == email))
            .cloned()
            .collect())
    }

    fn insert_option(
        &self,
        option: RegistrationOption,
    ) -> Result<RegistrationOption, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if !tables.leads.contains_key(&option.lead_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.options.contains_key(&option.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.options.insert(option.id, option.clone());
        Ok(option)
    }

    fn update_option(&self, option: RegistrationOption) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        match tables.options.get_mut(&option.id) {
            Some(existing) => {
                *existing = option;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_option(&self, id: OptionId) -> Result<Option<RegistrationOption>, RepositoryError> {
        Ok(lock(&self.tables)?.options.get(&id).cloned())
    }

    fn options(&self, lead: Option<&LeadId>) -> Result<Vec<RegistrationOption>, RepositoryError> {
        Ok(lock(&self.tables)?
            .options
            .values()
            .filter(|option| lead.map_or(true, |lead| &option.lead_id == lead))
            .cloned()
            .collect())
    }

    fn mark_options_paid(
        &self,
        lead: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RegistrationOption>, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let mut paid = Vec::new();
        for option in tables.options.values_mut() {
            if &option.lead_id == lead && option.paid_at.is_none() {
                option.paid_at = Some(at);
                option.updated_at = at;
                paid.push(option.clone());
            }
        }
        Ok(paid)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryWebhookPayloads {
    records: Arc<Mutex<BTreeMap<PayloadId, StripeWebhookPayload>>>,
}

impl WebhookPayloadRepository for InMemoryWebhookPayloads {
    fn insert(
        &self,
        payload: StripeWebhookPayload,
    ) -> Result<StripeWebhookPayload, RepositoryError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&payload.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(payload.id, payload.clone());
        Ok(payload)
    }

    fn update(&self, payload: StripeWebhookPayload) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records)?;
        match records.get_mut(&payload.id) {
            Some(existing) => {
                *existing = payload;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: PayloadId) -> Result<Option<StripeWebhookPayload>, RepositoryError> {
        Ok(lock(&self.records)?.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<StripeWebhookPayload>, RepositoryError> {
        Ok(lock(&self.records)?.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessions {
    sessions: Arc<Mutex<HashMap<String, WizardState>>>,
}

impl SessionStore for InMemorySessions {
    fn load(&self, session: &str) -> Result<Option<WizardState>, RepositoryError> {
        Ok(lock(&self.sessions)?.get(session).cloned())
    }

    fn save(&self, session: &str, state: WizardState) -> Result<(), RepositoryError> {
        lock(&self.sessions)?.insert(session.to_string(), state);
        Ok(())
    }

    fn remove(&self, session: &str) -> Result<(), RepositoryError> {
        lock(&self.sessions)?.remove(session);
        Ok(())
    }
}

#[derive(Default)]
struct GatewayLog {
    requests: Vec<CheckoutRequest>,
    sessions: Vec<CheckoutSession>,
    endpoints: Vec<WebhookEndpoint>,
}

/// Payment gateway that answers locally and records every checkout request.
#[derive(Default, Clone)]
pub struct RecordingGateway {
    log: Arc<Mutex<GatewayLog>>,
    failing: bool,
}

impl RecordingGateway {
    /// Rejects checkout sessions the way Stripe does for a bad request.
    pub fn failing() -> Self {
        Self {
            log: Arc::default(),
            failing: true,
        }
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.log
            .lock()
            .map(|log| log.requests.clone())
            .unwrap_or_default()
    }

    fn log(&self) -> Result<MutexGuard<'_, GatewayLog>, GatewayError> {
        self.log.lock().map_err(|_| GatewayError::Api {
            status: 500,
            message: "gateway log poisoned".to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        if self.failing {
            return Err(GatewayError::Api {
                status: 400,
                message: "Invalid API request".to_string(),
            });
        }
        let mut log = self.log()?;
        let id = format!("cs_test_{}", log.sessions.len() + 1);
        let amount_total = request
            .line_items
            .iter()
            .map(|item| item.unit_amount * i64::from(item.quantity))
            .sum();
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/c/pay/{id}")),
            status: Some("open".to_string()),
            payment_status: Some("unpaid".to_string()),
            customer_email: Some(request.customer_email.clone()),
            client_reference_id: Some(request.client_reference_id.clone()),
            amount_total: Some(amount_total),
            currency: request.line_items.first().map(|item| item.currency.clone()),
            created: Some(Utc::now().timestamp()),
            id,
        };
        log.requests.push(request.clone());
        log.sessions.push(session.clone());
        Ok(session)
    }

    async fn list_checkout_sessions(
        &self,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, GatewayError> {
        let log = self.log()?;
        Ok(log
            .sessions
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_webhook_endpoints(&self) -> Result<Vec<WebhookEndpoint>, GatewayError> {
        Ok(self.log()?.endpoints.clone())
    }

    async fn create_webhook_endpoint(
        &self,
        endpoint: &NewWebhookEndpoint,
    ) -> Result<WebhookEndpoint, GatewayError> {
        let mut log = self.log()?;
        let created = WebhookEndpoint {
            id: format!("we_test_{}", log.endpoints.len() + 1),
            url: endpoint.url.clone(),
            enabled_events: endpoint.enabled_events.clone(),
            status: Some("enabled".to_string()),
            secret: Some(format!("whsec_{}", Uuid::new_v4().simple())),
        };
        log.endpoints.push(WebhookEndpoint {
            secret: None,
            ..created.clone()
        });
        Ok(created)
    }

    async fn retrieve_account(&self) -> Result<AccountSummary, GatewayError> {
        Ok(AccountSummary {
            id: "acct_test".to_string(),
            email: Some("payments@directbnb.test".to_string()),
            country: Some("PT".to_string()),
            charges_enabled: true,
            payouts_enabled: true,
        })
    }
}
