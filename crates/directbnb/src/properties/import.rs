use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::domain::{
    Amenity, AmenityValue, CoHost, Coordinates, GeneralRule, Highlight, Host, HouseRules, Image,
    LocationDescription, PropertyContent, Rating, RuleValue, SubDescription,
};

/// Listing JSON as produced by the scraper service. Absent or `null`
/// sections are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedListing {
    #[serde(default)]
    room_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    is_super_host: bool,
    #[serde(default)]
    home_tier: Option<i64>,
    #[serde(default)]
    person_capacity: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    is_guest_favorite: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    coordinates: Option<ScrapedCoordinates>,
    #[serde(default)]
    rating: Option<ScrapedRating>,
    #[serde(default)]
    house_rules: Option<ScrapedHouseRules>,
    #[serde(default)]
    host: Option<ScrapedHost>,
    #[serde(default)]
    sub_description: Option<ScrapedSubDescription>,
    #[serde(default, deserialize_with = "nullable")]
    amenities: Vec<ScrapedAmenity>,
    #[serde(default, deserialize_with = "nullable")]
    images: Vec<ScrapedTitled>,
    #[serde(default, deserialize_with = "nullable")]
    location_descriptions: Vec<ScrapedTitled>,
    #[serde(default, deserialize_with = "nullable")]
    highlights: Vec<ScrapedTitled>,
    #[serde(default, deserialize_with = "nullable")]
    co_hosts: Vec<ScrapedHost>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedCoordinates {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedRating {
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    checking: Option<f64>,
    #[serde(default)]
    cleanliness: Option<f64>,
    #[serde(default)]
    communication: Option<f64>,
    #[serde(default)]
    location: Option<f64>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    guest_satisfaction: Option<f64>,
    #[serde(default, deserialize_with = "string_like")]
    review_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedHouseRules {
    // the scraper spells this key "aditional"
    #[serde(default, alias = "aditional")]
    additional: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    general: Vec<ScrapedGeneralRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedGeneralRule {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    values: Vec<ScrapedTitled>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedHost {
    #[serde(default, alias = "host_id", deserialize_with = "string_like")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedSubDescription {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedAmenity {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    values: Vec<ScrapedTitled>,
}

/// Shared shape of the many `{title, ...}` records in the payload.
#[derive(Debug, Clone, Default, Deserialize)]
struct ScrapedTitled {
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    icon: String,
    #[serde(default)]
    available: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    url: String,
    #[serde(default, deserialize_with = "nullable")]
    content: String,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl ScrapedListing {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn into_content(self) -> PropertyContent {
        PropertyContent {
            room_type: self.room_type,
            is_super_host: self.is_super_host,
            home_tier: self.home_tier,
            person_capacity: self.person_capacity,
            is_guest_favorite: self.is_guest_favorite,
            description: self.description,
            title: self.title,
            language: self.language,
            coordinates: self.coordinates.and_then(|coords| {
                Some(Coordinates {
                    latitude: coords.latitude?,
                    longitude: coords.longitude?,
                })
            }),
            rating: self.rating.map(|rating| Rating {
                accuracy: rating.accuracy,
                checking: rating.checking,
                cleanliness: rating.cleanliness,
                communication: rating.communication,
                location: rating.location,
                value: rating.value,
                guest_satisfaction: rating.guest_satisfaction,
                review_count: rating.review_count,
            }),
            house_rules: self.house_rules.map(|rules| HouseRules {
                additional: rules.additional,
                general: rules
                    .general
                    .into_iter()
                    .map(|rule| GeneralRule {
                        title: rule.title,
                        values: rule
                            .values
                            .into_iter()
                            .map(|value| RuleValue {
                                title: value.title,
                                icon: value.icon,
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            host: self.host.map(|host| Host {
                host_id: host.id.unwrap_or_default(),
                name: host.name.unwrap_or_default(),
            }),
            sub_description: self.sub_description.map(|sub| SubDescription {
                title: sub.title,
                items: sub.items,
            }),
            amenities: self
                .amenities
                .into_iter()
                .map(|amenity| Amenity {
                    title: amenity.title,
                    values: amenity
                        .values
                        .into_iter()
                        .map(|value| AmenityValue {
                            title: value.title,
                            subtitle: value.subtitle,
                            icon: value.icon,
                            available: value.available.unwrap_or(true),
                        })
                        .collect(),
                })
                .collect(),
            images: self
                .images
                .into_iter()
                .map(|image| Image {
                    title: image.title,
                    url: image.url,
                })
                .collect(),
            location_descriptions: self
                .location_descriptions
                .into_iter()
                .map(|item| LocationDescription {
                    title: item.title,
                    content: item.content,
                })
                .collect(),
            highlights: self
                .highlights
                .into_iter()
                .map(|item| Highlight {
                    title: item.title,
                    subtitle: item.subtitle.unwrap_or_default(),
                    icon: item.icon,
                })
                .collect(),
            co_hosts: self
                .co_hosts
                .into_iter()
                .map(|host| CoHost {
                    host_id: host.id,
                    name: host.name,
                })
                .collect(),
        }
    }
}
