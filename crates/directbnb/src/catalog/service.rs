use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::domain::{Frequency, Package, PackageId, PackageLabel, Promotion, PromotionId};
use super::pricing::{discounted_price, format_amount, monthly_price};
use super::repository::CatalogRepository;
use crate::repository::RepositoryError;
use crate::validation::FieldErrors;

static PACKAGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PROMOTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_package_id() -> PackageId {
    PackageId(PACKAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn next_promotion_id() -> PromotionId {
    PromotionId(PROMOTION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPackage {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency: Frequency,
    pub label: PackageLabel,
    #[serde(default)]
    pub extra_info: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPromotion {
    pub package: PackageId,
    pub discount_percentage: u8,
    #[serde(default)]
    pub units_available: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub promotion_code: Option<String>,
}

/// Catalog entry enriched with today's pricing.
#[derive(Debug, Clone, Serialize)]
pub struct PackageView {
    #[serde(flatten)]
    pub package: Package,
    pub promotions: Vec<Promotion>,
    pub discounted_price: Decimal,
    pub monthly_price: String,
    pub frequency_display: &'static str,
    pub label_display: &'static str,
}

/// Packages, promotions and the pricing rules that combine them.
pub struct CatalogService {
    repository: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn CatalogRepository> {
        &self.repository
    }

    pub fn create_package(&self, input: NewPackage) -> Result<Package, CatalogError> {
        let name = input.name.trim().to_string();
        let mut errors = FieldErrors::new();
        if name.is_empty() {
            errors.add("name", "This field may not be blank.");
        }
        if input.amount.is_sign_negative() {
            errors.add("amount", "Ensure this value is greater than or equal to 0.");
        }
        let currency = input.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 {
            errors.add("currency", "Ensure this field has exactly 3 characters.");
        }
        errors.into_result()?;

        let now = Utc::now();
        let package = Package {
            id: next_package_id(),
            name,
            currency,
            amount: input.amount,
            description: input.description.filter(|text| !text.trim().is_empty()),
            frequency: input.frequency,
            label: input.label,
            extra_info: input.extra_info,
            created_at: now,
            updated_at: now,
        };

        match self.repository.insert_package(package) {
            Ok(stored) => {
                info!(package_id = %stored.id, name = %stored.name, "package created");
                Ok(stored)
            }
            Err(RepositoryError::Conflict) => Err(CatalogError::Validation(FieldErrors::single(
                "name",
                "package with this name already exists.",
            ))),
            Err(other) => Err(other.into()),
        }
    }

    pub fn create_promotion(&self, input: NewPromotion) -> Result<Promotion, CatalogError> {
        let mut errors = FieldErrors::new();
        if input.discount_percentage > 100 {
            errors.add(
                "discount_percentage",
                "Ensure this value is less than or equal to 100.",
            );
        }
        if input.start_date > input.end_date {
            errors.add("end_date", "End date must not be before the start date.");
        }
        if self.repository.package(input.package)?.is_none() {
            errors.add(
                "package",
                format!("Invalid pk \"{}\" - object does not exist.", input.package),
            );
        }
        errors.into_result()?;

        let promotion = Promotion {
            id: next_promotion_id(),
            package_id: input.package,
            discount_percentage: input.discount_percentage,
            units_available: input.units_available,
            start_date: input.start_date,
            end_date: input.end_date,
            promotion_code: input
                .promotion_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
        };
        let stored = self.repository.insert_promotion(promotion)?;
        info!(
            promotion_id = %stored.id,
            package_id = %stored.package_id,
            discount = stored.discount_percentage,
            "promotion created"
        );
        Ok(stored)
    }

    pub fn package(&self, id: PackageId) -> Result<Package, CatalogError> {
        self.repository.package(id)?.ok_or(CatalogError::NotFound)
    }

    pub fn promotion(&self, id: PromotionId) -> Result<Promotion, CatalogError> {
        self.repository.promotion(id)?.ok_or(CatalogError::NotFound)
    }

    pub fn view(&self, package: Package, today: NaiveDate) -> Result<PackageView, CatalogError> {
        let promotions: Vec<Promotion> = self
            .repository
            .promotions_for(package.id)?
            .into_iter()
            .filter(|promotion| promotion.is_available(today))
            .collect();
        let discounted = discounted_price(&package, &promotions, today);
        let monthly = monthly_price(&package, discounted);

        Ok(PackageView {
            frequency_display: package.frequency.label(),
            label_display: package.label.label(),
            discounted_price: discounted,
            monthly_price: format_amount(monthly),
            promotions,
            package,
        })
    }

    /// All packages ordered by label then amount, grouped by label display string.
    pub fn grouped(
        &self,
        today: NaiveDate,
    ) -> Result<BTreeMap<&'static str, Vec<PackageView>>, CatalogError> {
        let mut packages = self.repository.packages()?;
        packages.sort_by(|a, b| {
            a.label
                .label()
                .cmp(b.label.label())
                .then(a.amount.cmp(&b.amount))
                .then(a.id.cmp(&b.id))
        });

        let mut grouped: BTreeMap<&'static str, Vec<PackageView>> = BTreeMap::new();
        for package in packages {
            let label = package.label.label();
            let view = self.view(package, today)?;
            grouped.entry(label).or_default().push(view);
        }
        Ok(grouped)
    }

    /// First promotion of the package that covers `today` and still has units.
    pub fn active_promotion(
        &self,
        package: PackageId,
        today: NaiveDate,
    ) -> Result<Option<Promotion>, CatalogError> {
        let mut promotions = self.repository.promotions_for(package)?;
        promotions.sort_by_key(|promotion| promotion.id);
        Ok(promotions
            .into_iter()
            .find(|promotion| promotion.is_available(today)))
    }

    pub fn reviews_addon(&self) -> Result<Option<Package>, CatalogError> {
        let mut packages = self.repository.packages()?;
        packages.sort_by_key(|package| package.id);
        Ok(packages.into_iter().find(|package| {
            package.label == PackageLabel::AddOn && package.name.to_lowercase().contains("reviews")
        }))
    }

    pub fn packages_labelled(&self, label: PackageLabel) -> Result<Vec<Package>, CatalogError> {
        let mut packages: Vec<Package> = self
            .repository
            .packages()?
            .into_iter()
            .filter(|package| package.label == label)
            .collect();
        packages.sort_by(|a, b| a.amount.cmp(&b.amount).then(a.id.cmp(&b.id)));
        Ok(packages)
    }

    pub fn consume_unit(&self, id: PromotionId) -> Result<Promotion, CatalogError> {
        let promotion = self.repository.consume_unit(id)?;
        info!(
            promotion_id = %promotion.id,
            units_available = ?promotion.units_available,
            "promotion unit consumed"
        );
        Ok(promotion)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("catalog entry not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FieldErrors> for CatalogError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
