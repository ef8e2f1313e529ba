use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::domain::{Package, Promotion};

/// Rounds a monetary value to cents using banker's rounding.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Applies the largest discount among the promotions available on `today`.
pub fn discounted_price(package: &Package, promotions: &[Promotion], today: NaiveDate) -> Decimal {
    promotions
        .iter()
        .filter(|promotion| promotion.package_id == package.id && promotion.is_available(today))
        .max_by_key(|promotion| promotion.discount_percentage)
        .map(|promotion| promotion.discounted_amount(package.amount, today))
        .unwrap_or(package.amount)
}

/// Per-month equivalent of a discounted price; zero for one-time packages.
pub fn monthly_price(package: &Package, discounted: Decimal) -> Decimal {
    match package.frequency.months() {
        Some(months) => round_money(discounted / Decimal::from(months)),
        None => Decimal::ZERO,
    }
}

/// `1234.5` → `"1,234.50"`.
pub fn format_amount(value: Decimal) -> String {
    let mut rounded = round_money(value);
    rounded.rescale(2);
    let rendered = rounded.abs().to_string();
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

/// Converts a major-unit amount into the integer minor units Stripe expects.
pub fn to_minor_units(value: Decimal) -> Option<i64> {
    (round_money(value) * Decimal::ONE_HUNDRED).trunc().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::domain::{Frequency, PackageId, PackageLabel, PromotionId};
    use chrono::Utc;
    use serde_json::Map;

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
    }

    fn package(amount: &str, frequency: Frequency) -> Package {
        Package {
            id: PackageId(7),
            name: "Hosting 1 year".to_string(),
            currency: "EUR".to_string(),
            amount: dec(amount),
            description: None,
            frequency,
            label: PackageLabel::Hosting,
            extra_info: Map::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn promotion(id: u64, discount: u8) -> Promotion {
        Promotion {
            id: PromotionId(id),
            package_id: PackageId(7),
            discount_percentage: discount,
            units_available: None,
            start_date: today(),
            end_date: today(),
            promotion_code: None,
        }
    }

    #[test]
    fn picks_the_largest_available_discount() {
        let package = package("240", Frequency::Yearly);
        let promotions = vec![promotion(1, 10), promotion(2, 25)];
        assert_eq!(discounted_price(&package, &promotions, today()), dec("180"));
        assert_eq!(discounted_price(&package, &[], today()), dec("240"));
    }

    #[test]
    fn monthly_price_divides_by_months() {
        assert_eq!(
            monthly_price(&package("240", Frequency::Yearly), dec("180")),
            dec("15")
        );
        assert_eq!(
            monthly_price(&package("100", Frequency::Triennial), dec("100")),
            dec("2.78")
        );
        assert_eq!(
            monthly_price(&package("500", Frequency::OneTime), dec("500")),
            Decimal::ZERO
        );
    }

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_amount(dec("1234567.5")), "1,234,567.50");
        assert_eq!(format_amount(dec("999")), "999.00");
        assert_eq!(format_amount(dec("0")), "0.00");
        assert_eq!(format_amount(dec("-1500.125")), "-1,500.12");
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(dec("84.99")), Some(8499));
        assert_eq!(to_minor_units(dec("100")), Some(10000));
    }
}
