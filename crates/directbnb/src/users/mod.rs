//! Portal accounts, email verification tokens and outgoing mail.

pub mod domain;
pub mod mailer;
pub mod repository;
pub mod router;
pub mod service;


pub use domain::{NewUser, User, UserId, UserToken};
pub use mailer::{LogMailer, MailError, Mailer, OutgoingEmail};
pub use repository::UserRepository;
pub use router::users_router;
pub use service::{ResendOutcome, UserService, UserServiceError, VerificationOutcome};
