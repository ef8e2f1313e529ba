use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, LineItem, PaymentGateway};
use super::summary::PaymentSummary;
use crate::catalog::pricing::to_minor_units;
use crate::catalog::CatalogRepository;
use crate::config::SiteConfig;
use crate::leads::{LeadId, LeadRegistration, LeadRepository};
use crate::repository::RepositoryError;

/// Payment state of a lead as shown on the checkout landing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStatus {
    pub lead_id: LeadId,
    pub completed: bool,
    pub paid_options: usize,
    pub total_options: usize,
}

impl CheckoutStatus {
    pub fn is_paid(&self) -> bool {
        self.total_options > 0 && self.paid_options == self.total_options
    }
}

/// Turns a lead's cart into a hosted checkout session.
pub struct CheckoutService {
    leads: Arc<dyn LeadRepository>,
    catalog: Arc<dyn CatalogRepository>,
    gateway: Arc<dyn PaymentGateway>,
    site: SiteConfig,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        catalog: Arc<dyn CatalogRepository>,
        gateway: Arc<dyn PaymentGateway>,
        site: SiteConfig,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            leads,
            catalog,
            gateway,
            site,
            currency: currency.into(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub fn success_url(&self, lead: &LeadId) -> String {
        self.site
            .absolute(&format!("/builder/checkout_success/{lead}"))
    }

    pub fn cancel_url(&self, lead: &LeadId) -> String {
        self.site
            .absolute(&format!("/builder/checkout_cancelled/{lead}"))
    }

    pub fn summary(
        &self,
        lead: &LeadId,
        today: NaiveDate,
    ) -> Result<PaymentSummary, CheckoutError> {
        let options = self.leads.options(Some(lead))?;
        Ok(PaymentSummary::build(
            &options,
            self.catalog.as_ref(),
            &self.currency,
            today,
        )?)
    }

    /// One line item per registration option, priced with the promotion
    /// available on `today`.
    pub fn build_request(
        &self,
        lead: &LeadId,
        today: NaiveDate,
    ) -> Result<CheckoutRequest, CheckoutError> {
        let registration = self.registration(lead)?;
        Ok(self.prepare(&registration, today)?.0)
    }

    fn registration(&self, lead: &LeadId) -> Result<LeadRegistration, CheckoutError> {
        self.leads.fetch(lead)?.ok_or(CheckoutError::LeadNotFound)
    }

    fn prepare(
        &self,
        registration: &LeadRegistration,
        today: NaiveDate,
    ) -> Result<(CheckoutRequest, PaymentSummary), CheckoutError> {
        if registration.is_completed() {
            return Err(CheckoutError::LeadCompleted);
        }

        let summary = self.summary(&registration.id, today)?;
        if summary.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let line_items = summary
            .lines
            .iter()
            .map(|line| {
                let unit_amount = to_minor_units(line.discounted)
                    .ok_or_else(|| CheckoutError::InvalidAmount(line.package_name.clone()))?;
                Ok(LineItem {
                    name: line.package_name.clone(),
                    unit_amount,
                    currency: line.currency.to_lowercase(),
                    quantity: 1,
                })
            })
            .collect::<Result<Vec<_>, CheckoutError>>()?;

        let request = CheckoutRequest {
            client_reference_id: registration.id.to_string(),
            customer_email: registration.email.clone(),
            line_items,
            success_url: self.success_url(&registration.id),
            cancel_url: self.cancel_url(&registration.id),
        };
        Ok((request, summary))
    }

    pub async fn create_for_lead(
        &self,
        lead: &LeadId,
        today: NaiveDate,
    ) -> Result<CheckoutSession, CheckoutError> {
        let registration = self.registration(lead)?;
        self.create_for(&registration, today).await
    }

    /// Opens a session for `registration` as given, so callers can apply
    /// pending changes before the customer details go to the provider. Each
    /// option keeps the price it was charged for the payment receipt.
    pub async fn create_for(
        &self,
        registration: &LeadRegistration,
        today: NaiveDate,
    ) -> Result<CheckoutSession, CheckoutError> {
        let lead = &registration.id;
        let (request, summary) = self.prepare(registration, today)?;
        let session = match self.gateway.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(err) => {
                warn!(lead_id = %lead, error = %err, "checkout session creation failed");
                return Err(err.into());
            }
        };
        if session.url.is_none() {
            return Err(GatewayError::MissingUrl.into());
        }
        self.freeze_prices(&summary)?;
        info!(
            lead_id = %lead,
            session_id = %session.id,
            items = request.line_items.len(),
            "checkout session created"
        );
        Ok(session)
    }

    fn freeze_prices(&self, summary: &PaymentSummary) -> Result<(), CheckoutError> {
        for line in &summary.lines {
            let Some(mut option) = self.leads.fetch_option(line.option_id)? else {
                continue;
            };
            option.charged = Some(line.charged_price());
            self.leads.update_option(option)?;
        }
        Ok(())
    }

    pub fn status(&self, lead: &LeadId) -> Result<CheckoutStatus, CheckoutError> {
        let registration = self
            .leads
            .fetch(lead)?
            .ok_or(CheckoutError::LeadNotFound)?;
        let options = self.leads.options(Some(lead))?;
        Ok(CheckoutStatus {
            lead_id: registration.id,
            completed: registration.is_completed(),
            paid_options: options.iter().filter(|option| option.is_paid()).count(),
            total_options: options.len(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("lead registration not found")]
    LeadNotFound,
    #[error("This registration has already been completed.")]
    LeadCompleted,
    #[error("No registration options selected.")]
    EmptyCart,
    #[error("amount for {0} cannot be expressed in minor units")]
    InvalidAmount(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
