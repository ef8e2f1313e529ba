use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::pricing::{format_amount, round_money};
use crate::catalog::CatalogRepository;
use crate::leads::{ChargedPrice, OptionId, RegistrationOption};
use crate::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub option_id: OptionId,
    pub package_name: String,
    pub currency: String,
    pub original: Decimal,
    /// Present only when a promotion is attached and available.
    pub discount_percentage: Option<u8>,
    pub discounted: Decimal,
}

impl SummaryLine {
    pub fn charged_price(&self) -> ChargedPrice {
        ChargedPrice {
            original: self.original,
            discount_percentage: self.discount_percentage,
            amount: self.discounted,
            currency: self.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pricing {
    Current,
    Charged,
}

/// What the customer pays for a lead's options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub lines: Vec<SummaryLine>,
    pub total: Decimal,
    pub currency: String,
}

impl PaymentSummary {
    /// Prices every option with the promotions available on `today`.
    pub fn build(
        options: &[RegistrationOption],
        catalog: &dyn CatalogRepository,
        fallback_currency: &str,
        today: NaiveDate,
    ) -> Result<Self, RepositoryError> {
        Self::assemble(options, catalog, fallback_currency, today, Pricing::Current)
    }

    /// Options frozen by a checkout session keep the amounts they were charged;
    /// the rest are priced on `today`.
    pub fn charged(
        options: &[RegistrationOption],
        catalog: &dyn CatalogRepository,
        fallback_currency: &str,
        today: NaiveDate,
    ) -> Result<Self, RepositoryError> {
        Self::assemble(options, catalog, fallback_currency, today, Pricing::Charged)
    }

    fn assemble(
        options: &[RegistrationOption],
        catalog: &dyn CatalogRepository,
        fallback_currency: &str,
        today: NaiveDate,
        pricing: Pricing,
    ) -> Result<Self, RepositoryError> {
        let mut lines = Vec::with_capacity(options.len());
        for option in options {
            let package = catalog
                .package(option.package_id)?
                .ok_or(RepositoryError::NotFound)?;

            if let (Pricing::Charged, Some(charged)) = (pricing, &option.charged) {
                lines.push(SummaryLine {
                    option_id: option.id,
                    package_name: package.name,
                    currency: charged.currency.clone(),
                    original: charged.original,
                    discount_percentage: charged.discount_percentage,
                    discounted: charged.amount,
                });
                continue;
            }

            let promotion = match option.promotion_id {
                Some(id) => catalog.promotion(id)?,
                None => None,
            };
            let applied = promotion.filter(|promotion| promotion.is_available(today));
            let discounted = match &applied {
                Some(promotion) => promotion.discounted_amount(package.amount, today),
                None => package.amount,
            };
            let currency = if package.currency.trim().is_empty() {
                fallback_currency.to_uppercase()
            } else {
                package.currency.trim().to_uppercase()
            };
            lines.push(SummaryLine {
                option_id: option.id,
                package_name: package.name,
                currency,
                original: package.amount,
                discount_percentage: applied.map(|promotion| promotion.discount_percentage),
                discounted,
            });
        }

        let total = round_money(lines.iter().map(|line| line.discounted).sum());
        let currency = lines
            .first()
            .map(|line| line.currency.clone())
            .unwrap_or_else(|| fallback_currency.to_uppercase());
        Ok(Self {
            lines,
            total,
            currency,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Plain-text rendering used in emails and CLI output.
    pub fn render_text(&self) -> String {
        let mut rendered = String::new();
        for line in &self.lines {
            match line.discount_percentage {
                Some(discount) => rendered.push_str(&format!(
                    "- {}: {} {} ({}% off) -> {} {}\n",
                    line.package_name,
                    format_amount(line.original),
                    line.currency,
                    discount,
                    format_amount(line.discounted),
                    line.currency,
                )),
                None => rendered.push_str(&format!(
                    "- {}: {} {}\n",
                    line.package_name,
                    format_amount(line.discounted),
                    line.currency,
                )),
            }
        }
        rendered.push_str(&format!(
            "Total: {} {}\n",
            format_amount(self.total),
            self.currency
        ));
        rendered
    }
}
