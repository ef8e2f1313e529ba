use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::catalog::{PackageId, PromotionId};
use crate::site::{ColorSchemeId, ThemeId};
use crate::users::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub Uuid);

impl LeadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub u64);

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A prospective customer's registration before (and after) payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRegistration {
    pub id: LeadId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub theme: Option<ThemeId>,
    pub color_scheme: Option<ColorSchemeId>,
    pub listing_urls: Vec<String>,
    pub domain_name: Option<String>,
    pub extra_requirements: Map<String, Value>,
    pub user: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadRegistration {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One cart line tying a lead to a package and an optional promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOption {
    pub id: OptionId,
    #[serde(rename = "lead_registration")]
    pub lead_id: LeadId,
    #[serde(rename = "package")]
    pub package_id: PackageId,
    #[serde(rename = "promotion")]
    pub promotion_id: Option<PromotionId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Price sent to the payment provider by the latest checkout session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charged: Option<ChargedPrice>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationOption {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// Amounts frozen when a checkout session is opened for an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargedPrice {
    pub original: Decimal,
    pub discount_percentage: Option<u8>,
    pub amount: Decimal,
    pub currency: String,
}

/// Response shape for a lead; the email address is write-only.
#[derive(Debug, Clone, Serialize)]
pub struct LeadView {
    pub id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub theme: Option<ThemeId>,
    pub color_scheme: Option<ColorSchemeId>,
    pub listing_urls: Vec<String>,
    pub domain_name: Option<String>,
    pub registration_options: Vec<RegistrationOption>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub extra_requirements: Map<String, Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub checkout_url: Option<String>,
}

impl LeadView {
    pub fn new(
        lead: LeadRegistration,
        registration_options: Vec<RegistrationOption>,
        checkout_url: Option<String>,
    ) -> Self {
        Self {
            id: lead.id,
            first_name: lead.first_name,
            last_name: lead.last_name,
            phone_number: lead.phone_number,
            theme: lead.theme,
            color_scheme: lead.color_scheme,
            listing_urls: lead.listing_urls,
            domain_name: lead.domain_name,
            registration_options,
            created_at: lead.created_at,
            updated_at: lead.updated_at,
            extra_requirements: lead.extra_requirements,
            completed_at: lead.completed_at,
            checkout_url,
        }
    }
}

/// Body of a lead registration request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadSubmission {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub theme: Option<ThemeId>,
    #[serde(default)]
    pub color_scheme: Option<ColorSchemeId>,
    #[serde(default)]
    pub listing_urls: Option<Vec<String>>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub extra_requirements: Option<Map<String, Value>>,
    #[serde(default)]
    pub confirm_email: Option<String>,
}

/// Partial update of a lead; absent keys leave fields untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub theme: Option<Option<ThemeId>>,
    #[serde(default, deserialize_with = "present")]
    pub color_scheme: Option<Option<ColorSchemeId>>,
    #[serde(default, deserialize_with = "present")]
    pub listing_urls: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub domain_name: Option<Option<String>>,
    #[serde(default)]
    pub extra_requirements: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "present")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub confirm_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionSubmission {
    pub lead_registration: LeadId,
    pub package: PackageId,
    #[serde(default)]
    pub promotion: Option<PromotionId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionPatch {
    #[serde(default)]
    pub package: Option<PackageId>,
    #[serde(default, deserialize_with = "present")]
    pub promotion: Option<Option<PromotionId>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
