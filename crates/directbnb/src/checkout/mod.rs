//! Stripe checkout sessions and webhook driven payment reconciliation.

pub mod event;
pub mod gateway;
pub mod receipt;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod session;
pub mod signature;
pub mod stripe;
pub mod summary;
pub mod webhook;


pub use event::StripeEvent;
pub use gateway::{
    AccountSummary, CheckoutRequest, CheckoutSession, GatewayError, LineItem,
    NewWebhookEndpoint, PaymentGateway, WebhookEndpoint,
};
pub use reconcile::{PaymentReconciler, ReconcileError, Reconciliation};
pub use repository::{PayloadId, StripeWebhookPayload, WebhookPayloadRepository};
pub use router::{checkout_router, CheckoutState};
pub use session::{CheckoutError, CheckoutService, CheckoutStatus};
pub use signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER};
pub use stripe::StripeClient;
pub use summary::{PaymentSummary, SummaryLine};
pub use webhook::{WebhookError, WebhookOutcome, WebhookService};
