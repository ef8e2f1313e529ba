use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::users::UserId;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(ThemeId);
numeric_id!(ColorSchemeId);
numeric_id!(WebsiteId);

/// Color slots understood by the site themes.
pub const COLOR_NAMES: [&str; 9] = [
    "base",
    "primary",
    "secondary",
    "accent",
    "neutral",
    "info",
    "success",
    "warning",
    "error",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
    pub preview_link: Option<String>,
    pub icon_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColor {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub id: ColorSchemeId,
    pub name: String,
    pub internal_name: Option<String>,
    pub theme_colors: Vec<ThemeColor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub id: WebsiteId,
    pub owner: UserId,
    pub theme: ThemeId,
    pub color_scheme: ColorSchemeId,
    pub airbnb_listing_url: Option<String>,
    pub booking_listing_url: Option<String>,
    pub domain_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Host (with port) of `url`; empty for blank or unparsable input.
pub fn get_domain(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match Url::parse(trimmed) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Validates the raw `theme_colors` payload of a color scheme.
pub fn parse_theme_colors(raw: &Value) -> Result<Vec<ThemeColor>, String> {
    let items = raw
        .as_array()
        .ok_or_else(|| "Theme colors must be a list.".to_string())?;

    items
        .iter()
        .map(|item| {
            let object = item
                .as_object()
                .ok_or_else(|| "Each item in theme colors must be a dictionary.".to_string())?;
            let (Some(name), Some(value)) = (object.get("name"), object.get("value")) else {
                return Err("Each color item must have a 'name' and 'value'.".to_string());
            };
            let name = match name {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            };
            if !COLOR_NAMES.contains(&name.as_str()) {
                return Err(format!("Invalid color name: {name}"));
            }
            let value = match value {
                Value::String(value) => value.clone(),
                other => other.to_string(),
            };
            Ok(ThemeColor { name, value })
        })
        .collect()
}
