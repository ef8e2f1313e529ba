use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::domain::{NewUser, User, UserId, UserToken};
use super::mailer::{verification_email, MailError, Mailer};
use super::repository::UserRepository;
use crate::config::SiteConfig;
use crate::repository::RepositoryError;

static USER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_user_id() -> UserId {
    UserId(USER_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Confirmed(UserId),
    AlreadyConfirmed(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    AlreadyVerified,
    /// No account for the address; callers answer as if the email was sent.
    Unknown,
}

/// Account creation, email verification tokens and verification mail.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    site: SiteConfig,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        site: SiteConfig,
    ) -> Self {
        Self {
            repository,
            mailer,
            site,
        }
    }

    pub fn email_taken(&self, email: &str) -> Result<bool, UserServiceError> {
        Ok(self.repository.find_by_email(email)?.is_some())
    }

    pub fn fetch(&self, id: UserId) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.fetch(id)?)
    }

    /// Returns the account for `details.email`, creating an active but
    /// unconfirmed one without a password when none exists.
    pub fn get_or_create(
        &self,
        details: NewUser,
        now: DateTime<Utc>,
    ) -> Result<(User, bool), UserServiceError> {
        let email = details.email.trim().to_lowercase();
        if let Some(existing) = self.repository.find_by_email(&email)? {
            return Ok((existing, false));
        }

        let user = User {
            id: next_user_id(),
            email,
            first_name: details.first_name,
            last_name: details.last_name,
            phone_number: details.phone_number,
            is_active: true,
            is_email_confirmed: false,
            is_staff: false,
            registered_at: now,
        };

        match self.repository.insert(user) {
            Ok(stored) => {
                info!(user_id = %stored.id, "user account created");
                Ok((stored, true))
            }
            Err(RepositoryError::Conflict) => {
                let existing = self
                    .repository
                    .find_by_email(&details.email.trim().to_lowercase())?
                    .ok_or(RepositoryError::NotFound)?;
                Ok((existing, false))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Replaces any outstanding token of the user with a fresh one.
    pub fn issue_token(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<UserToken, UserServiceError> {
        let hours = self.site.verification_token_ttl_hours;
        let expires_at = i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(UserServiceError::InvalidTokenTtl(hours))?;

        self.repository.delete_tokens_for(user)?;
        let token = UserToken {
            token: Uuid::new_v4(),
            user_id: user,
            created_at: now,
            expires_at,
        };
        self.repository.insert_token(token.clone())?;
        Ok(token)
    }

    pub fn verification_url(&self, token: &UserToken) -> String {
        self.site
            .absolute(&format!("/users/verify-email/{}", token.token))
    }

    pub fn verify_email(
        &self,
        token: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, UserServiceError> {
        let stored = self
            .repository
            .token(token)?
            .ok_or(UserServiceError::TokenNotFound)?;

        if stored.is_expired(now) {
            self.repository.delete_token(token)?;
            return Err(UserServiceError::TokenExpired);
        }

        let mut user = self
            .repository
            .fetch(stored.user_id)?
            .ok_or(UserServiceError::TokenNotFound)?;

        if user.is_email_confirmed {
            self.repository.delete_token(token)?;
            return Ok(VerificationOutcome::AlreadyConfirmed(user.id));
        }

        user.is_email_confirmed = true;
        user.is_active = true;
        let user_id = user.id;
        self.repository.update(user)?;
        self.repository.delete_token(token)?;
        info!(user_id = %user_id, "email address confirmed");
        Ok(VerificationOutcome::Confirmed(user_id))
    }

    pub fn resend_verification(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<ResendOutcome, UserServiceError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.repository.find_by_email(&email)? else {
            warn!("verification resend requested for unknown address");
            return Ok(ResendOutcome::Unknown);
        };

        if user.is_email_confirmed {
            return Ok(ResendOutcome::AlreadyVerified);
        }

        let token = self.issue_token(user.id, now)?;
        let url = self.verification_url(&token);
        self.mailer
            .send(verification_email(&user.first_name, &user.email, &url))?;
        info!(user_id = %user.id, "verification email re-sent");
        Ok(ResendOutcome::Sent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("verification token not found")]
    TokenNotFound,
    #[error("verification token expired")]
    TokenExpired,
    #[error("verification token lifetime of {0} hours is out of range")]
    InvalidTokenTtl(u64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Mail(#[from] MailError),
}
