use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::users::UserId;

/// Header set by the front proxy once it has authenticated a portal user.
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// Caller identity resolved for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(UserId),
    Admin,
}

impl Principal {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Principal::User(id) => Some(*id),
            Principal::Anonymous | Principal::Admin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin)
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Principal::Anonymous)
    }
}

/// Resolves principals from request headers.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_token_digest: Option<[u8; 32]>,
}

impl AccessPolicy {
    pub fn new(admin_token: Option<&str>) -> Self {
        Self {
            admin_token_digest: admin_token
                .filter(|token| !token.is_empty())
                .map(|token| Sha256::digest(token.as_bytes()).into()),
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Principal {
        if let (Some(expected), Some(presented)) = (self.admin_token_digest, bearer_token(headers))
        {
            let digest: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
            if digest == expected {
                return Principal::Admin;
            }
        }

        headers
            .get(AUTHENTICATED_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|id| Principal::User(UserId(id)))
            .unwrap_or(Principal::Anonymous)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
}
