//! Lead registrations captured before payment and the options in their cart.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    ChargedPrice, LeadId, LeadPatch, LeadRegistration, LeadSubmission, LeadView, OptionId,
    OptionPatch, OptionSubmission, RegistrationOption,
};
pub use repository::LeadRepository;
pub use router::{leads_router, LeadsState};
pub use service::{LeadDraft, LeadError, LeadService};
