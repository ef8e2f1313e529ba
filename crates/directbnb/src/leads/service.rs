use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use super::domain::{
    LeadId, LeadPatch, LeadRegistration, LeadSubmission, LeadView, OptionId, OptionPatch,
    OptionSubmission, RegistrationOption,
};
use super::repository::LeadRepository;
use super::validation::{invalid_listing_urls, is_blacklisted, is_valid_email, normalize_email};
use crate::catalog::{CatalogRepository, PackageId, PromotionId};
use crate::checkout::{CheckoutError, CheckoutService};
use crate::config::SiteConfig;
use crate::repository::RepositoryError;
use crate::site::{ColorSchemeId, SiteRepository, ThemeId};
use crate::users::{UserId, UserRepository};
use crate::validation::FieldErrors;

static OPTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_option_id() -> OptionId {
    OptionId(OPTION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

const NAME_MAX_LEN: usize = 255;

/// Contact details collected by the wizard, applied to a new or existing lead.
#[derive(Debug, Clone, Default)]
pub struct LeadDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub listing_urls: Vec<String>,
    pub domain_name: Option<String>,
    pub theme: Option<ThemeId>,
    pub color_scheme: Option<ColorSchemeId>,
    pub user: Option<UserId>,
}

pub struct LeadService {
    leads: Arc<dyn LeadRepository>,
    catalog: Arc<dyn CatalogRepository>,
    sites: Arc<dyn SiteRepository>,
    users: Arc<dyn UserRepository>,
    checkout: Arc<CheckoutService>,
    settings: SiteConfig,
}

impl LeadService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        catalog: Arc<dyn CatalogRepository>,
        sites: Arc<dyn SiteRepository>,
        users: Arc<dyn UserRepository>,
        checkout: Arc<CheckoutService>,
        settings: SiteConfig,
    ) -> Self {
        Self {
            leads,
            catalog,
            sites,
            users,
            checkout,
            settings,
        }
    }

    pub fn register(
        &self,
        submission: LeadSubmission,
        now: DateTime<Utc>,
    ) -> Result<LeadView, LeadError> {
        let mut errors = FieldErrors::new();
        check_honeypot(submission.confirm_email.as_deref(), &mut errors);
        let email = self.check_email(&submission.email, None, &mut errors)?;
        let first_name = check_name("first_name", &submission.first_name, &mut errors);
        let last_name = check_name("last_name", &submission.last_name, &mut errors);
        self.check_references(submission.theme, submission.color_scheme, &mut errors)?;
        let listing_urls = submission.listing_urls.unwrap_or_default();
        check_listing_urls(&listing_urls, &mut errors);
        errors.into_result()?;

        let lead = LeadRegistration {
            id: LeadId::new(),
            email,
            first_name,
            last_name,
            phone_number: non_blank(submission.phone_number),
            theme: submission.theme,
            color_scheme: submission.color_scheme,
            listing_urls,
            domain_name: non_blank(submission.domain_name),
            extra_requirements: submission.extra_requirements.unwrap_or_default(),
            user: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let stored = self.leads.insert(lead)?;
        info!(lead_id = %stored.id, "lead registered");
        Ok(LeadView::new(stored, Vec::new(), None))
    }

    /// Applies a partial update. When the patch completes a lead that is still
    /// open, a checkout session is created for the patched lead before the
    /// lead is stored, and its URL is returned with the view.
    pub async fn update(
        &self,
        id: &LeadId,
        patch: LeadPatch,
        now: DateTime<Utc>,
    ) -> Result<LeadView, LeadError> {
        let mut lead = self.fetch(id)?;

        let mut errors = FieldErrors::new();
        check_honeypot(patch.confirm_email.as_deref(), &mut errors);
        let email = match patch.email.as_deref() {
            Some(raw) => Some(self.check_email(raw, Some(&lead.email), &mut errors)?),
            None => None,
        };
        let first_name = patch
            .first_name
            .as_deref()
            .map(|raw| check_name("first_name", raw, &mut errors));
        let last_name = patch
            .last_name
            .as_deref()
            .map(|raw| check_name("last_name", raw, &mut errors));
        self.check_references(
            patch.theme.flatten(),
            patch.color_scheme.flatten(),
            &mut errors,
        )?;
        if let Some(Some(urls)) = patch.listing_urls.as_ref() {
            check_listing_urls(urls, &mut errors);
        }
        errors.into_result()?;

        if let Some(email) = email {
            lead.email = email;
        }
        if let Some(first_name) = first_name {
            lead.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            lead.last_name = last_name;
        }
        if let Some(phone_number) = patch.phone_number {
            lead.phone_number = non_blank(phone_number);
        }
        if let Some(theme) = patch.theme {
            lead.theme = theme;
        }
        if let Some(color_scheme) = patch.color_scheme {
            lead.color_scheme = color_scheme;
        }
        if let Some(listing_urls) = patch.listing_urls {
            lead.listing_urls = listing_urls.unwrap_or_default();
        }
        if let Some(domain_name) = patch.domain_name {
            lead.domain_name = non_blank(domain_name);
        }
        if let Some(extra) = patch.extra_requirements {
            lead.extra_requirements = extra;
        }
        lead.updated_at = now;

        let checkout_url = match patch.completed_at {
            Some(Some(_)) if !lead.is_completed() => {
                let session = self.checkout.create_for(&lead, now.date_naive()).await?;
                session.url
            }
            _ => None,
        };
        if let Some(completed_at) = patch.completed_at {
            lead.completed_at = completed_at;
        }

        self.leads.update(lead.clone())?;
        let options = self.leads.options(Some(&lead.id))?;
        info!(lead_id = %lead.id, checkout = checkout_url.is_some(), "lead updated");
        Ok(LeadView::new(lead, options, checkout_url))
    }

    pub fn fetch(&self, id: &LeadId) -> Result<LeadRegistration, LeadError> {
        self.leads.fetch(id)?.ok_or(LeadError::NotFound)
    }

    pub fn get(&self, id: &LeadId) -> Result<LeadView, LeadError> {
        let lead = self.fetch(id)?;
        let options = self.leads.options(Some(&lead.id))?;
        Ok(LeadView::new(lead, options, None))
    }

    /// Leads ordered by `updated_at`, then `created_at`.
    pub fn list(&self, email: Option<&str>) -> Result<Vec<LeadView>, LeadError> {
        let email = email.map(normalize_email);
        let mut leads = self.leads.list(email.as_deref())?;
        leads.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then(a.created_at.cmp(&b.created_at))
        });
        leads
            .into_iter()
            .map(|lead| {
                let options = self.leads.options(Some(&lead.id))?;
                Ok(LeadView::new(lead, options, None))
            })
            .collect()
    }

    pub fn add_option(
        &self,
        submission: OptionSubmission,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOption, LeadError> {
        let mut errors = FieldErrors::new();
        if self.leads.fetch(&submission.lead_registration)?.is_none() {
            errors.add(
                "lead_registration",
                format!(
                    "Invalid pk \"{}\" - object does not exist.",
                    submission.lead_registration
                ),
            );
        }
        self.check_package(submission.package, submission.promotion, &mut errors)?;
        errors.into_result()?;

        let option = RegistrationOption {
            id: next_option_id(),
            lead_id: submission.lead_registration,
            package_id: submission.package,
            promotion_id: submission.promotion,
            paid_at: None,
            expires_at: None,
            charged: None,
            created_at: now,
            updated_at: now,
        };
        let stored = self.leads.insert_option(option)?;
        info!(
            lead_id = %stored.lead_id,
            package_id = %stored.package_id,
            option_id = %stored.id,
            "registration option added"
        );
        Ok(stored)
    }

    pub fn option(&self, id: OptionId) -> Result<RegistrationOption, LeadError> {
        self.leads.fetch_option(id)?.ok_or(LeadError::NotFound)
    }

    /// Rejected with `Completed` once the owning lead has been completed.
    pub fn update_option(
        &self,
        id: OptionId,
        patch: OptionPatch,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOption, LeadError> {
        let mut option = self.option(id)?;
        let lead = self.fetch(&option.lead_id)?;
        if lead.is_completed() {
            return Err(LeadError::Completed);
        }

        let package = patch.package.unwrap_or(option.package_id);
        let promotion = match patch.promotion {
            Some(promotion) => promotion,
            None => option.promotion_id,
        };
        let mut errors = FieldErrors::new();
        self.check_package(package, promotion, &mut errors)?;
        errors.into_result()?;

        option.package_id = package;
        option.promotion_id = promotion;
        option.charged = None;
        option.updated_at = now;
        self.leads.update_option(option.clone())?;
        Ok(option)
    }

    pub fn list_options(
        &self,
        lead: Option<&LeadId>,
    ) -> Result<Vec<RegistrationOption>, LeadError> {
        Ok(self.leads.options(lead)?)
    }

    /// Marks every unpaid option of the lead as paid at `at`.
    pub fn mark_paid(
        &self,
        lead: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RegistrationOption>, LeadError> {
        Ok(self.leads.mark_options_paid(lead, at)?)
    }

    /// Creates or refreshes the lead behind a wizard session.
    pub fn save_draft(
        &self,
        existing: Option<&LeadId>,
        draft: LeadDraft,
        now: DateTime<Utc>,
    ) -> Result<LeadRegistration, LeadError> {
        let current = match existing {
            Some(id) => self.leads.fetch(id)?,
            None => None,
        };

        match current {
            Some(mut lead) => {
                lead.email = normalize_email(&draft.email);
                lead.first_name = draft.first_name;
                lead.last_name = draft.last_name;
                lead.phone_number = draft.phone_number;
                lead.listing_urls = draft.listing_urls;
                lead.domain_name = draft.domain_name;
                lead.theme = draft.theme;
                lead.color_scheme = draft.color_scheme;
                if draft.user.is_some() {
                    lead.user = draft.user;
                }
                lead.updated_at = now;
                self.leads.update(lead.clone())?;
                Ok(lead)
            }
            None => {
                let lead = LeadRegistration {
                    id: LeadId::new(),
                    email: normalize_email(&draft.email),
                    first_name: draft.first_name,
                    last_name: draft.last_name,
                    phone_number: draft.phone_number,
                    theme: draft.theme,
                    color_scheme: draft.color_scheme,
                    listing_urls: draft.listing_urls,
                    domain_name: draft.domain_name,
                    extra_requirements: Default::default(),
                    user: draft.user,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                };
                let stored = self.leads.insert(lead)?;
                info!(lead_id = %stored.id, "lead created from wizard");
                Ok(stored)
            }
        }
    }

    pub fn set_extra_requirement(
        &self,
        id: &LeadId,
        key: &str,
        value: Value,
        now: DateTime<Utc>,
    ) -> Result<LeadRegistration, LeadError> {
        let mut lead = self.fetch(id)?;
        lead.extra_requirements.insert(key.to_string(), value);
        lead.updated_at = now;
        self.leads.update(lead.clone())?;
        Ok(lead)
    }

    fn check_email(
        &self,
        raw: &str,
        current: Option<&str>,
        errors: &mut FieldErrors,
    ) -> Result<String, LeadError> {
        let email = normalize_email(raw);
        if current == Some(email.as_str()) {
            return Ok(email);
        }
        if email.is_empty() {
            errors.add("email", "This field is required.");
        } else if !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        } else if is_blacklisted(&email, &self.settings.email_blacklist) {
            errors.add(
                "email",
                "This email domain has been blacklisted. Please use a different email address.",
            );
        } else if self.users.find_by_email(&email)?.is_some() {
            errors.add(
                "email",
                format!(
                    "A user with this email already exists. Login to your portal on {}.",
                    self.settings.site_url.as_str().trim_end_matches('/')
                ),
            );
        }
        Ok(email)
    }

    fn check_references(
        &self,
        theme: Option<ThemeId>,
        color_scheme: Option<ColorSchemeId>,
        errors: &mut FieldErrors,
    ) -> Result<(), LeadError> {
        if let Some(theme) = theme {
            if self.sites.theme(theme)?.is_none() {
                errors.add(
                    "theme",
                    format!("Invalid pk \"{theme}\" - object does not exist."),
                );
            }
        }
        if let Some(scheme) = color_scheme {
            if self.sites.color_scheme(scheme)?.is_none() {
                errors.add(
                    "color_scheme",
                    format!("Invalid pk \"{scheme}\" - object does not exist."),
                );
            }
        }
        Ok(())
    }

    fn check_package(
        &self,
        package: PackageId,
        promotion: Option<PromotionId>,
        errors: &mut FieldErrors,
    ) -> Result<(), LeadError> {
        if self.catalog.package(package)?.is_none() {
            errors.add(
                "package",
                format!("Invalid pk \"{package}\" - object does not exist."),
            );
        }
        if let Some(promotion) = promotion {
            match self.catalog.promotion(promotion)? {
                None => errors.add(
                    "promotion",
                    format!("Invalid pk \"{promotion}\" - object does not exist."),
                ),
                Some(found) if found.package_id != package => errors.add(
                    "promotion",
                    "Promotion does not apply to the selected package.",
                ),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn check_honeypot(value: Option<&str>, errors: &mut FieldErrors) {
    if value.is_some_and(|raw| !raw.trim().is_empty()) {
        errors.add("confirm_email", "Invalid submission.");
    }
}

fn check_name(field: &str, raw: &str, errors: &mut FieldErrors) -> String {
    let name = raw.trim();
    if name.is_empty() {
        errors.add(field, "This field is required.");
    } else if name.chars().count() > NAME_MAX_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {NAME_MAX_LEN} characters."),
        );
    }
    name.to_string()
}

fn check_listing_urls(urls: &[String], errors: &mut FieldErrors) {
    for message in invalid_listing_urls(urls) {
        errors.add("listing_urls", message);
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("lead registration not found")]
    NotFound,
    #[error("lead registration is already completed")]
    Completed,
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FieldErrors> for LeadError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
