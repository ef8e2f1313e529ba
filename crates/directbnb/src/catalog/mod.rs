//! Packages, promotions and the pricing rules shown on the catalog page.

pub mod domain;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{Frequency, Package, PackageId, PackageLabel, Promotion, PromotionId};
pub use repository::CatalogRepository;
pub use router::{catalog_router, CatalogState};
pub use service::{CatalogError, CatalogService, NewPackage, NewPromotion, PackageView};
