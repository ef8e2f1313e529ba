use super::domain::{Package, PackageId, Promotion, PromotionId};
use crate::repository::RepositoryError;

/// Storage abstraction for packages and their promotions.
pub trait CatalogRepository: Send + Sync {
    /// Fails with `Conflict` when a package with the same name exists.
    fn insert_package(&self, package: Package) -> Result<Package, RepositoryError>;
    fn package(&self, id: PackageId) -> Result<Option<Package>, RepositoryError>;
    fn packages(&self) -> Result<Vec<Package>, RepositoryError>;
    fn insert_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError>;
    fn promotion(&self, id: PromotionId) -> Result<Option<Promotion>, RepositoryError>;
    fn promotions_for(&self, package: PackageId) -> Result<Vec<Promotion>, RepositoryError>;
    /// Decrements bounded `units_available` by one, never below zero.
    fn consume_unit(&self, id: PromotionId) -> Result<Promotion, RepositoryError>;
}
