use uuid::Uuid;

use super::domain::{User, UserId, UserToken};
use crate::repository::RepositoryError;

pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the (case-insensitive) email is taken.
    fn insert(&self, user: User) -> Result<User, RepositoryError>;
    fn update(&self, user: User) -> Result<(), RepositoryError>;
    fn fetch(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn insert_token(&self, token: UserToken) -> Result<(), RepositoryError>;
    fn token(&self, token: &Uuid) -> Result<Option<UserToken>, RepositoryError>;
    fn delete_token(&self, token: &Uuid) -> Result<(), RepositoryError>;
    fn delete_tokens_for(&self, user: UserId) -> Result<(), RepositoryError>;
}
