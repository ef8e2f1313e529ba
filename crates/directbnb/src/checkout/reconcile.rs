use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::receipt::confirmation_email;
use super::summary::PaymentSummary;
use crate::catalog::{CatalogError, CatalogService};
use crate::leads::{LeadId, LeadRepository, OptionId};
use crate::repository::RepositoryError;
use crate::users::{Mailer, NewUser, UserId, UserService, UserServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub lead_id: LeadId,
    pub user_id: UserId,
    pub user_created: bool,
    pub newly_paid: Vec<OptionId>,
    pub email_sent: bool,
}

/// Applies a completed checkout to the lead, its options and the customer account.
pub struct PaymentReconciler {
    leads: Arc<dyn LeadRepository>,
    catalog: Arc<CatalogService>,
    users: Arc<UserService>,
    mailer: Arc<dyn Mailer>,
    currency: String,
}

impl PaymentReconciler {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        catalog: Arc<CatalogService>,
        users: Arc<UserService>,
        mailer: Arc<dyn Mailer>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            leads,
            catalog,
            users,
            mailer,
            currency: currency.into(),
        }
    }

    /// Safe to repeat: options already paid keep their `paid_at`, the existing
    /// account is reused, and no second welcome mail goes out.
    pub fn complete_checkout(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, ReconcileError> {
        let mut lead = self
            .leads
            .fetch(lead_id)?
            .ok_or(ReconcileError::LeadNotFound)?;

        let options = self.leads.options(Some(lead_id))?;
        let summary = PaymentSummary::charged(
            &options,
            self.catalog.repository().as_ref(),
            &self.currency,
            now.date_naive(),
        )?;

        let newly_paid = self.leads.mark_options_paid(lead_id, now)?;
        for option in &newly_paid {
            let Some(promotion) = option.promotion_id else {
                continue;
            };
            let discounted = option
                .charged
                .as_ref()
                .map_or(true, |charged| charged.discount_percentage.is_some());
            if !discounted {
                continue;
            }
            match self.catalog.consume_unit(promotion) {
                Ok(_) => {}
                Err(CatalogError::NotFound) => {
                    warn!(lead_id = %lead_id, promotion_id = %promotion, "promotion vanished")
                }
                Err(other) => return Err(other.into()),
            }
        }

        let (user, user_created) = self.users.get_or_create(
            NewUser {
                email: lead.email.clone(),
                first_name: lead.first_name.clone(),
                last_name: lead.last_name.clone(),
                phone_number: lead.phone_number.clone(),
            },
            now,
        )?;

        if lead.user != Some(user.id) || lead.completed_at.is_none() {
            lead.user = Some(user.id);
            if lead.completed_at.is_none() {
                lead.completed_at = Some(now);
            }
            lead.updated_at = now;
            self.leads.update(lead.clone())?;
        }

        let mut email_sent = false;
        if user_created || !newly_paid.is_empty() {
            let token = self.users.issue_token(user.id, now)?;
            let verify_url = self.users.verification_url(&token);
            let email = confirmation_email(&lead, &summary, &verify_url);
            match self.mailer.send(email) {
                Ok(()) => email_sent = true,
                Err(err) => warn!(
                    lead_id = %lead_id,
                    user_id = %user.id,
                    error = %err,
                    "confirmation email failed"
                ),
            }
        }

        info!(
            lead_id = %lead_id,
            user_id = %user.id,
            user_created,
            newly_paid = newly_paid.len(),
            "checkout reconciled"
        );
        Ok(Reconciliation {
            lead_id: *lead_id,
            user_id: user.id,
            user_created,
            newly_paid: newly_paid.iter().map(|option| option.id).collect(),
            email_sent,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("lead registration not found")]
    LeadNotFound,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Users(#[from] UserServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
