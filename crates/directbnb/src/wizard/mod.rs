//! Seven-step booking wizard that turns a visitor into a lead with a cart.

pub mod router;
pub mod service;
pub mod state;
pub mod steps;


pub use router::{wizard_router, WizardRouterState};
pub use service::{SubmitOutcome, WizardError, WizardService, WizardView};
pub use state::{SessionStore, WizardState, TOTAL_STEPS};
