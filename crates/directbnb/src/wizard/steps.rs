//! Inputs accepted by each wizard step and the checks that need no storage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leads::validation::{is_http_url, is_valid_email, normalize_email};
use crate::validation::{FieldErrors, NON_FIELD_ERRORS};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const DOMAIN_MAX_LEN: usize = 200;
const NAME_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeStep {
    pub theme: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSchemeStep {
    pub color_scheme: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingLinksStep {
    pub airbnb_link: Option<String>,
    pub booking_com_link: Option<String>,
    pub not_listed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStep {
    pub domain_name: Option<String>,
    pub skip_domain: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactStep {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Honeypot; real visitors never fill it.
    pub confirm_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageStep {
    pub package: Option<u64>,
    pub hosting_plan: Option<u64>,
    pub live_reviews: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewStep {
    pub micro_invest: bool,
    pub terms_accepted: bool,
}

pub fn parse<T: DeserializeOwned>(input: Value) -> Result<T, FieldErrors> {
    serde_json::from_value(input)
        .map_err(|err| FieldErrors::single(NON_FIELD_ERRORS, format!("Invalid input: {err}")))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl BookingLinksStep {
    pub fn clean(self) -> Result<Self, FieldErrors> {
        let airbnb_link = trimmed(self.airbnb_link);
        let booking_com_link = trimmed(self.booking_com_link);

        let mut errors = FieldErrors::new();
        if let Some(link) = &airbnb_link {
            if !is_http_url(link) {
                errors.add("airbnb_link", "Enter a valid URL.");
            } else if !link.to_lowercase().contains("airbnb.") {
                errors.add("airbnb_link", "Please enter a valid Airbnb URL.");
            }
        }
        if let Some(link) = &booking_com_link {
            if !is_http_url(link) {
                errors.add("booking_com_link", "Enter a valid URL.");
            } else if !link.to_lowercase().contains("booking.") {
                errors.add("booking_com_link", "Please enter a valid Booking.com URL.");
            }
        }
        if !self.not_listed && airbnb_link.is_none() && booking_com_link.is_none() {
            errors.add(
                NON_FIELD_ERRORS,
                "Please enter at least one booking URL or select that your apartment is not \
                 listed.",
            );
        }
        errors.into_result()?;

        Ok(Self {
            airbnb_link,
            booking_com_link,
            not_listed: self.not_listed,
        })
    }

    pub fn listing_urls(&self) -> Vec<String> {
        self.airbnb_link
            .iter()
            .chain(self.booking_com_link.iter())
            .cloned()
            .collect()
    }
}

impl DomainStep {
    pub fn clean(self) -> Result<Self, FieldErrors> {
        let domain_name = trimmed(self.domain_name);
        if domain_name
            .as_ref()
            .is_some_and(|name| name.chars().count() > DOMAIN_MAX_LEN)
        {
            return Err(FieldErrors::single(
                "domain_name",
                format!("Ensure this value has at most {DOMAIN_MAX_LEN} characters."),
            ));
        }
        Ok(Self {
            domain_name,
            skip_domain: self.skip_domain,
        })
    }
}

impl ContactStep {
    pub fn clean(self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        for (field, value) in [("first_name", &first_name), ("last_name", &last_name)] {
            if value.is_empty() {
                errors.add(field, REQUIRED);
            } else if value.chars().count() > NAME_MAX_LEN {
                errors.add(
                    field,
                    format!("Ensure this value has at most {NAME_MAX_LEN} characters."),
                );
            }
        }

        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        let phone = if self.phone.trim().is_empty() {
            errors.add("phone", REQUIRED);
            String::new()
        } else {
            match normalize_phone(&self.phone) {
                Some(phone) => phone,
                None => {
                    errors.add("phone", "Enter a valid phone number (e.g. +12125552368).");
                    String::new()
                }
            }
        };

        if self
            .confirm_email
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
        {
            errors.add("confirm_email", "Invalid submission detected.");
        }
        errors.into_result()?;

        Ok(Self {
            first_name,
            last_name,
            email,
            phone,
            confirm_email: None,
        })
    }
}

/// `+` followed by 7 to 15 digits once spaces, dots, dashes and parentheses
/// are removed. Returns the compact form.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+')?;
    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_digit());
    valid.then(|| format!("+{digits}"))
}

impl ReviewStep {
    pub fn clean(self) -> Result<Self, FieldErrors> {
        if !self.terms_accepted {
            return Err(FieldErrors::single(
                "terms_accepted",
                "You must accept the terms and conditions to proceed.",
            ));
        }
        Ok(self)
    }
}
