use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::state::{SessionStore, WizardState, TOTAL_STEPS};
use super::steps::{
    parse, BookingLinksStep, ColorSchemeStep, ContactStep, DomainStep, PackageStep, ReviewStep,
    ThemeStep, INVALID_CHOICE, REQUIRED,
};
use crate::catalog::pricing::round_money;
use crate::catalog::{CatalogError, CatalogService, Package, PackageId, PackageLabel};
use crate::checkout::CheckoutService;
use crate::leads::{LeadDraft, LeadError, LeadId, LeadService, OptionSubmission};
use crate::repository::RepositoryError;
use crate::site::{ColorSchemeId, SiteRepository, ThemeId};
use crate::users::{UserId, UserRepository};
use crate::validation::FieldErrors;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub step: u8,
    pub total_steps: u8,
    pub data: serde_json::Map<String, Value>,
    pub lead_id: Option<LeadId>,
    pub summary: Option<Value>,
    /// Stored values for the current step, or the signed-in user's contact
    /// details on step 5 when nothing is stored yet.
    pub initial: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Advanced(WizardView),
    Completed {
        lead_id: LeadId,
        checkout_url: String,
    },
}

/// The seven-step booking wizard: theme, colors, listing links, domain,
/// contact details, packages, review.
pub struct WizardService {
    sessions: Arc<dyn SessionStore>,
    sites: Arc<dyn SiteRepository>,
    users: Arc<dyn UserRepository>,
    catalog: Arc<CatalogService>,
    leads: Arc<LeadService>,
    checkout: Arc<CheckoutService>,
}

impl WizardService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        sites: Arc<dyn SiteRepository>,
        users: Arc<dyn UserRepository>,
        catalog: Arc<CatalogService>,
        leads: Arc<LeadService>,
        checkout: Arc<CheckoutService>,
    ) -> Self {
        Self {
            sessions,
            sites,
            users,
            catalog,
            leads,
            checkout,
        }
    }

    fn load(&self, session: &str) -> Result<WizardState, WizardError> {
        Ok(self.sessions.load(session)?.unwrap_or_default())
    }

    pub fn view(&self, session: &str, user: Option<UserId>) -> Result<WizardView, WizardError> {
        let state = self.load(session)?;
        self.render(state, user)
    }

    fn render(&self, state: WizardState, user: Option<UserId>) -> Result<WizardView, WizardError> {
        let mut initial = state.step_data(state.step).cloned();
        if initial.is_none() && state.step == 5 {
            if let Some(user) = user.map(|id| self.users.fetch(id)).transpose()?.flatten() {
                initial = Some(json!({
                    "first_name": user.first_name,
                    "last_name": user.last_name,
                    "email": user.email,
                    "phone": user.phone_number,
                }));
            }
        }
        Ok(WizardView {
            step: state.step,
            total_steps: TOTAL_STEPS,
            data: state.data,
            lead_id: state.lead_id,
            summary: state.summary,
            initial: initial.unwrap_or_else(|| json!({})),
        })
    }

    /// Validates `input` against the current step. Valid input is stored and
    /// the wizard advances; the last step completes the registration.
    pub async fn submit(
        &self,
        session: &str,
        user: Option<UserId>,
        input: Value,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, WizardError> {
        let mut state = self.load(session)?;
        let step = state.step.clamp(1, TOTAL_STEPS);

        let cleaned = match step {
            1 => self.theme_step(parse(input)?)?,
            2 => self.color_scheme_step(parse(input)?)?,
            3 => to_value(parse::<BookingLinksStep>(input)?.clean()?),
            4 => to_value(parse::<DomainStep>(input)?.clean()?),
            5 => {
                let contact = parse::<ContactStep>(input)?.clean()?;
                let lead = self.save_contact(&state, &contact, user, now)?;
                state.lead_id = Some(lead);
                to_value(contact)
            }
            6 => {
                let (cleaned, summary) = self.package_step(parse(input)?)?;
                state.summary = Some(summary);
                cleaned
            }
            _ => to_value(parse::<ReviewStep>(input)?.clean()?),
        };
        state.set_step_data(step, cleaned);

        if step < TOTAL_STEPS {
            state.step = step + 1;
            self.sessions.save(session, state.clone())?;
            return Ok(SubmitOutcome::Advanced(self.render(state, user)?));
        }

        self.sessions.save(session, state.clone())?;
        self.complete(session, state, now).await
    }

    pub fn back(&self, session: &str, user: Option<UserId>) -> Result<WizardView, WizardError> {
        let mut state = self.load(session)?;
        if state.step > 1 {
            state.step -= 1;
            self.sessions.save(session, state.clone())?;
        }
        self.render(state, user)
    }

    pub fn reset(&self, session: &str, user: Option<UserId>) -> Result<WizardView, WizardError> {
        self.sessions.remove(session)?;
        self.render(WizardState::default(), user)
    }

    fn theme_step(&self, input: ThemeStep) -> Result<Value, WizardError> {
        let Some(theme) = input.theme else {
            return Err(FieldErrors::single("theme", REQUIRED).into());
        };
        if self.sites.theme(ThemeId(theme))?.is_none() {
            return Err(FieldErrors::single("theme", INVALID_CHOICE).into());
        }
        Ok(to_value(input))
    }

    fn color_scheme_step(&self, input: ColorSchemeStep) -> Result<Value, WizardError> {
        let Some(scheme) = input.color_scheme else {
            return Err(FieldErrors::single("color_scheme", REQUIRED).into());
        };
        if self.sites.color_scheme(ColorSchemeId(scheme))?.is_none() {
            return Err(FieldErrors::single("color_scheme", INVALID_CHOICE).into());
        }
        Ok(to_value(input))
    }

    fn save_contact(
        &self,
        state: &WizardState,
        contact: &ContactStep,
        user: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<LeadId, WizardError> {
        let links = BookingLinksStep {
            airbnb_link: state.text(3, "airbnb_link"),
            booking_com_link: state.text(3, "booking_com_link"),
            not_listed: state.flag(3, "not_listed"),
        };
        let draft = LeadDraft {
            email: contact.email.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            phone_number: Some(contact.phone.clone()),
            listing_urls: links.listing_urls(),
            domain_name: state.text(4, "domain_name"),
            theme: state.id(1, "theme").map(ThemeId),
            color_scheme: state.id(2, "color_scheme").map(ColorSchemeId),
            user,
        };
        let lead = self.leads.save_draft(state.lead_id.as_ref(), draft, now)?;
        Ok(lead.id)
    }

    fn labelled_package(
        &self,
        field: &str,
        id: Option<u64>,
        label: PackageLabel,
        errors: &mut FieldErrors,
    ) -> Result<Option<Package>, WizardError> {
        let Some(id) = id else {
            errors.add(field, REQUIRED);
            return Ok(None);
        };
        match self.catalog.package(PackageId(id)) {
            Ok(package) if package.label == label => Ok(Some(package)),
            Ok(_) | Err(CatalogError::NotFound) => {
                errors.add(field, INVALID_CHOICE);
                Ok(None)
            }
            Err(other) => Err(other.into()),
        }
    }

    fn package_step(&self, input: PackageStep) -> Result<(Value, Value), WizardError> {
        let mut errors = FieldErrors::new();
        let builder =
            self.labelled_package("package", input.package, PackageLabel::Builder, &mut errors)?;
        let hosting = self.labelled_package(
            "hosting_plan",
            input.hosting_plan,
            PackageLabel::Hosting,
            &mut errors,
        )?;
        let (Some(builder), Some(hosting)) = (builder, hosting) else {
            return Err(errors.into());
        };

        let addon = if input.live_reviews {
            self.catalog.reviews_addon()?
        } else {
            None
        };

        let mut total = builder.amount + hosting.amount;
        let mut summary = json!({
            "package": package_details(&builder),
            "hosting": package_details(&hosting),
        });
        if let Some(addon) = &addon {
            total += addon.amount;
            summary["addon"] = package_details(addon);
        }
        summary["total"] = json!({
            "amount": amount_text(total),
            "currency": builder.currency,
        });
        Ok((to_value(input), summary))
    }

    async fn complete(
        &self,
        session: &str,
        mut state: WizardState,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, WizardError> {
        let Some(lead_id) = state.lead_id else {
            return Err(WizardError::SessionExpired);
        };
        let today = now.date_naive();

        self.create_options(&state, &lead_id, now)
            .map_err(|err| WizardError::Payment(err.to_string()))?;

        if state.flag(7, "micro_invest") {
            self.leads
                .set_extra_requirement(&lead_id, "microInvest", Value::Bool(true), now)
                .map_err(|err| WizardError::Payment(err.to_string()))?;
        }

        let session_result = self.checkout.create_for_lead(&lead_id, today).await;
        let checkout = match session_result {
            Ok(checkout) => checkout,
            Err(err) => {
                warn!(lead_id = %lead_id, error = %err, "wizard checkout failed");
                return Err(WizardError::Payment(err.to_string()));
            }
        };
        let checkout_url = checkout
            .url
            .ok_or_else(|| WizardError::Payment("checkout session has no URL".to_string()))?;

        state.data.clear();
        state.summary = None;
        state.step = 1;
        self.sessions.save(session, state)?;

        info!(lead_id = %lead_id, "booking wizard completed");
        Ok(SubmitOutcome::Completed {
            lead_id,
            checkout_url,
        })
    }

    fn create_options(
        &self,
        state: &WizardState,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<(), WizardError> {
        let today = now.date_naive();
        if let Some(package) = state.id(6, "package").map(PackageId) {
            let promotion = self.catalog.active_promotion(package, today)?;
            self.leads.add_option(
                OptionSubmission {
                    lead_registration: *lead_id,
                    package,
                    promotion: promotion.map(|promotion| promotion.id),
                },
                now,
            )?;
        }
        if let Some(hosting) = state.id(6, "hosting_plan").map(PackageId) {
            self.leads.add_option(
                OptionSubmission {
                    lead_registration: *lead_id,
                    package: hosting,
                    promotion: None,
                },
                now,
            )?;
        }
        if state.flag(6, "live_reviews") {
            if let Some(addon) = self.catalog.reviews_addon()? {
                self.leads.add_option(
                    OptionSubmission {
                        lead_registration: *lead_id,
                        package: addon.id,
                        promotion: None,
                    },
                    now,
                )?;
            }
        }
        Ok(())
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn amount_text(amount: Decimal) -> String {
    let mut rounded = round_money(amount);
    rounded.rescale(2);
    rounded.to_string()
}

fn package_details(package: &Package) -> Value {
    json!({
        "id": package.id,
        "name": package.name,
        "amount": amount_text(package.amount),
        "currency": package.currency,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("Session expired. Please start again.")]
    SessionExpired,
    #[error("Error processing payment: {0}")]
    Payment(String),
    #[error(transparent)]
    Leads(#[from] LeadError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FieldErrors> for WizardError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
