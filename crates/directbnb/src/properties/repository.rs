use super::domain::{Property, PropertyId};
use crate::repository::RepositoryError;
use crate::users::UserId;

pub trait PropertyRepository: Send + Sync {
    fn insert(&self, property: Property) -> Result<Property, RepositoryError>;
    /// Replaces the whole aggregate in one write.
    fn update(&self, property: Property) -> Result<(), RepositoryError>;
    fn fetch(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError>;
    /// Every property when `owner` is `None`, ordered by id.
    fn list(&self, owner: Option<UserId>) -> Result<Vec<Property>, RepositoryError>;
    fn delete(&self, id: PropertyId) -> Result<(), RepositoryError>;
}
