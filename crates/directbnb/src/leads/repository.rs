use chrono::{DateTime, Utc};

use super::domain::{LeadId, LeadRegistration, OptionId, RegistrationOption};
use crate::repository::RepositoryError;

pub trait LeadRepository: Send + Sync {
    fn insert(&self, lead: LeadRegistration) -> Result<LeadRegistration, RepositoryError>;
    fn update(&self, lead: LeadRegistration) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRegistration>, RepositoryError>;
    /// Leads whose email equals `email` when given, otherwise all of them.
    fn list(&self, email: Option<&str>) -> Result<Vec<LeadRegistration>, RepositoryError>;

    fn insert_option(
        &self,
        option: RegistrationOption,
    ) -> Result<RegistrationOption, RepositoryError>;
    fn update_option(&self, option: RegistrationOption) -> Result<(), RepositoryError>;
    fn fetch_option(&self, id: OptionId) -> Result<Option<RegistrationOption>, RepositoryError>;
    /// Options of one lead when given, otherwise every option; ordered by id.
    fn options(&self, lead: Option<&LeadId>) -> Result<Vec<RegistrationOption>, RepositoryError>;
    /// Sets `paid_at` on the lead's unpaid options and returns exactly those.
    fn mark_options_paid(
        &self,
        lead: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RegistrationOption>, RepositoryError>;
}
