use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::access::AccessPolicy;
use crate::catalog::domain::{Frequency, Package, PackageId, PackageLabel, Promotion, PromotionId};
use crate::catalog::repository::CatalogRepository;
use crate::catalog::service::{CatalogService, NewPackage, NewPromotion};
use crate::memory::InMemoryCatalog;
use crate::repository::RepositoryError;

pub(super) const ADMIN_TOKEN: &str = "catalog-admin";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 20).expect("valid date")
}

pub(super) fn dec(raw: &str) -> Decimal {
    raw.parse().expect("decimal literal")
}

pub(super) fn build_service() -> (Arc<CatalogService>, Arc<InMemoryCatalog>) {
    let repository = Arc::new(InMemoryCatalog::default());
    let service = Arc::new(CatalogService::new(repository.clone()));
    (service, repository)
}

pub(super) fn policy() -> AccessPolicy {
    AccessPolicy::new(Some(ADMIN_TOKEN))
}

pub(super) fn new_package(
    name: &str,
    amount: &str,
    frequency: Frequency,
    label: PackageLabel,
) -> NewPackage {
    NewPackage {
        name: name.to_string(),
        currency: "EUR".to_string(),
        amount: dec(amount),
        description: None,
        frequency,
        label,
        extra_info: Map::new(),
    }
}

pub(super) fn new_promotion(package: PackageId, discount: u8, units: Option<u32>) -> NewPromotion {
    NewPromotion {
        package,
        discount_percentage: discount,
        units_available: units,
        start_date: NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"),
        end_date: NaiveDate::from_ymd_opt(2025, 5, 31).expect("valid date"),
        promotion_code: Some(" SPRING ".to_string()),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) struct UnavailableCatalog;

impl CatalogRepository for UnavailableCatalog {
    fn insert_package(&self, _package: Package) -> Result<Package, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn package(&self, _id: PackageId) -> Result<Option<Package>, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn packages(&self) -> Result<Vec<Package>, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn insert_promotion(&self, _promotion: Promotion) -> Result<Promotion, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn promotion(&self, _id: PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn promotions_for(&self, _package: PackageId) -> Result<Vec<Promotion>, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn consume_unit(&self, _id: PromotionId) -> Result<Promotion, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }
}
