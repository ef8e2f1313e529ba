use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::users::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub u64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub accuracy: Option<f64>,
    pub checking: Option<f64>,
    pub cleanliness: Option<f64>,
    pub communication: Option<f64>,
    pub location: Option<f64>,
    pub value: Option<f64>,
    pub guest_satisfaction: Option<f64>,
    pub review_count: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleValue {
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralRule {
    pub title: String,
    pub values: Vec<RuleValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseRules {
    pub additional: Option<String>,
    pub general: Vec<GeneralRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub host_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubDescription {
    pub title: String,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityValue {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amenity {
    pub title: String,
    pub values: Vec<AmenityValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationDescription {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Highlight {
    pub title: String,
    pub subtitle: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoHost {
    pub host_id: Option<String>,
    pub name: Option<String>,
}

/// Everything a listing describes, independent of who owns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyContent {
    pub room_type: Option<String>,
    pub is_super_host: bool,
    pub home_tier: Option<i64>,
    pub person_capacity: Option<i64>,
    pub is_guest_favorite: bool,
    pub description: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub rating: Option<Rating>,
    pub house_rules: Option<HouseRules>,
    pub host: Option<Host>,
    pub sub_description: Option<SubDescription>,
    pub amenities: Vec<Amenity>,
    pub images: Vec<Image>,
    pub location_descriptions: Vec<LocationDescription>,
    pub highlights: Vec<Highlight>,
    pub co_hosts: Vec<CoHost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner: UserId,
    #[serde(flatten)]
    pub content: PropertyContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight row used by list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub owner_email: Option<String>,
    pub title: Option<String>,
    pub room_type: Option<String>,
    pub person_capacity: Option<i64>,
    pub is_guest_favorite: bool,
    pub is_super_host: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn summary(&self, owner_email: Option<String>) -> PropertySummary {
        PropertySummary {
            id: self.id,
            owner_email,
            title: self.content.title.clone(),
            room_type: self.content.room_type.clone(),
            person_capacity: self.content.person_capacity,
            is_guest_favorite: self.content.is_guest_favorite,
            is_super_host: self.content.is_super_host,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
