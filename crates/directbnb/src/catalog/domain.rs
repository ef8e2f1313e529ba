use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pricing::round_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub u64);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromotionId(pub u64);

impl fmt::Display for PromotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Billing cadence of a package, stored as its numeric code (1..=7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Frequency {
    OneTime,
    Monthly,
    Quarterly,
    Yearly,
    Biennial,
    Triennial,
    Quinquennial,
}

impl Frequency {
    pub fn code(self) -> u8 {
        match self {
            Frequency::OneTime => 1,
            Frequency::Monthly => 2,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 4,
            Frequency::Biennial => 5,
            Frequency::Triennial => 6,
            Frequency::Quinquennial => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::OneTime => "One time payment",
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
            Frequency::Yearly => "Yearly",
            Frequency::Biennial => "Every 2 years",
            Frequency::Triennial => "Every 3 years",
            Frequency::Quinquennial => "Every 5 years",
        }
    }

    pub fn renewal_days(self) -> Option<u64> {
        match self {
            Frequency::OneTime => None,
            Frequency::Monthly => Some(30),
            Frequency::Quarterly => Some(90),
            Frequency::Yearly => Some(365),
            Frequency::Biennial => Some(730),
            Frequency::Triennial => Some(1095),
            Frequency::Quinquennial => Some(1825),
        }
    }

    pub fn months(self) -> Option<u32> {
        match self {
            Frequency::OneTime => None,
            Frequency::Monthly => Some(1),
            Frequency::Quarterly => Some(3),
            Frequency::Yearly => Some(12),
            Frequency::Biennial => Some(24),
            Frequency::Triennial => Some(36),
            Frequency::Quinquennial => Some(60),
        }
    }
}

impl TryFrom<u8> for Frequency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Frequency::OneTime),
            2 => Ok(Frequency::Monthly),
            3 => Ok(Frequency::Quarterly),
            4 => Ok(Frequency::Yearly),
            5 => Ok(Frequency::Biennial),
            6 => Ok(Frequency::Triennial),
            7 => Ok(Frequency::Quinquennial),
            other => Err(format!("\"{other}\" is not a valid choice.")),
        }
    }
}

impl From<Frequency> for u8 {
    fn from(value: Frequency) -> Self {
        value.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageLabel {
    Builder,
    Hosting,
    #[serde(rename = "Add-on")]
    AddOn,
}

impl PackageLabel {
    pub fn label(self) -> &'static str {
        match self {
            PackageLabel::Builder => "Builder",
            PackageLabel::Hosting => "Hosting",
            PackageLabel::AddOn => "Add-on",
        }
    }
}

/// Purchasable offering shown in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub currency: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub label: PackageLabel,
    pub extra_info: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Days left before a subscription started on `started_on` renews.
    pub fn days_until_renewal(&self, started_on: NaiveDate, today: NaiveDate) -> Option<i64> {
        let days = self.frequency.renewal_days()?;
        let renews_on = started_on.checked_add_days(Days::new(days))?;
        Some((renews_on - today).num_days().max(0))
    }

    pub fn is_one_time(&self) -> bool {
        self.frequency == Frequency::OneTime
    }
}

/// Time and quantity bounded discount on a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    #[serde(rename = "package")]
    pub package_id: PackageId,
    pub discount_percentage: u8,
    pub units_available: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub promotion_code: Option<String>,
}

impl Promotion {
    pub fn covers(&self, today: NaiveDate) -> bool {
        self.start_date <= today && today <= self.end_date
    }

    pub fn is_available(&self, today: NaiveDate) -> bool {
        self.covers(today) && self.units_available.map_or(true, |units| units > 0)
    }

    pub fn discounted_amount(&self, amount: Decimal, today: NaiveDate) -> Decimal {
        if !self.is_available(today) {
            return amount;
        }
        let remaining = Decimal::from(100u8.saturating_sub(self.discount_percentage));
        round_money(amount * remaining / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn promotion(discount: u8, units: Option<u32>) -> Promotion {
        Promotion {
            id: PromotionId(1),
            package_id: PackageId(1),
            discount_percentage: discount,
            units_available: units,
            start_date: date(2025, 1, 1),
            end_date: date(2025, 12, 31),
            promotion_code: None,
        }
    }

    #[test]
    fn frequency_round_trips_numeric_codes() {
        let parsed: Frequency = serde_json::from_value(serde_json::json!(5)).expect("code 5");
        assert_eq!(parsed, Frequency::Biennial);
        assert_eq!(parsed.label(), "Every 2 years");
        assert_eq!(parsed.renewal_days(), Some(730));
        assert!(serde_json::from_value::<Frequency>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn add_on_label_uses_display_string() {
        let value = serde_json::to_value(PackageLabel::AddOn).expect("serializes");
        assert_eq!(value, "Add-on");
    }

    #[test]
    fn availability_requires_dates_and_units() {
        let today = date(2025, 6, 1);
        assert!(promotion(50, None).is_available(today));
        assert!(promotion(50, Some(3)).is_available(today));
        assert!(!promotion(50, Some(0)).is_available(today));
        assert!(!promotion(50, None).is_available(date(2026, 1, 1)));
    }

    #[test]
    fn discount_rounds_to_cents_and_skips_unavailable() {
        let today = date(2025, 6, 1);
        assert_eq!(
            promotion(15, None).discounted_amount(dec("99.99"), today),
            dec("84.99")
        );
        assert_eq!(
            promotion(15, Some(0)).discounted_amount(dec("99.99"), today),
            dec("99.99")
        );
        assert_eq!(
            promotion(100, None).discounted_amount(dec("250"), today),
            Decimal::ZERO
        );
    }

    #[test]
    fn renewal_countdown_for_recurring_packages() {
        let package = Package {
            id: PackageId(1),
            name: "Hosting".to_string(),
            currency: "EUR".to_string(),
            amount: dec("120"),
            description: None,
            frequency: Frequency::Yearly,
            label: PackageLabel::Hosting,
            extra_info: Map::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            package.days_until_renewal(date(2025, 1, 1), date(2025, 12, 1)),
            Some(30)
        );

        let one_time = Package {
            frequency: Frequency::OneTime,
            ..package
        };
        assert_eq!(
            one_time.days_until_renewal(date(2025, 1, 1), date(2025, 2, 1)),
            None
        );
    }
}
