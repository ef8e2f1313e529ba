use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use super::domain::{
    Coordinates, Host, HouseRules, Property, PropertyContent, PropertyId, PropertySummary,
};
use super::import::ScrapedListing;
use super::repository::PropertyRepository;
use crate::access::Principal;
use crate::repository::RepositoryError;
use crate::users::{UserId, UserRepository};
use crate::validation::{FieldErrors, NON_FIELD_ERRORS};

pub const PAGE_SIZE: usize = 10;

static PROPERTY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_property_id() -> PropertyId {
    PropertyId(PROPERTY_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub total_pages: usize,
    pub results: Vec<T>,
}

pub struct PropertyService {
    repository: Arc<dyn PropertyRepository>,
    users: Arc<dyn UserRepository>,
}

impl PropertyService {
    pub fn new(repository: Arc<dyn PropertyRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { repository, users }
    }

    /// Persists a scraped listing as a new property of `owner`.
    pub fn import(
        &self,
        owner: UserId,
        listing: ScrapedListing,
    ) -> Result<Property, PropertyError> {
        let stored = self.insert(owner, listing.into_content())?;
        info!(property_id = %stored.id, owner = %owner, "listing imported");
        Ok(stored)
    }

    pub fn list(
        &self,
        owner: Option<UserId>,
        page: usize,
    ) -> Result<Page<PropertySummary>, PropertyError> {
        let properties = self.repository.list(owner)?;
        self.paginate(properties, page)
    }

    pub fn my_properties(
        &self,
        principal: Principal,
        page: usize,
    ) -> Result<Page<PropertySummary>, PropertyError> {
        let owner = principal.user_id().ok_or(PropertyError::Unauthenticated)?;
        self.list(Some(owner), page)
    }

    pub fn retrieve(&self, id: PropertyId) -> Result<Property, PropertyError> {
        self.repository.fetch(id)?.ok_or(PropertyError::NotFound)
    }

    pub fn create(
        &self,
        principal: Principal,
        content: PropertyContent,
    ) -> Result<Property, PropertyError> {
        let owner = principal.user_id().ok_or(PropertyError::Unauthenticated)?;
        self.insert(owner, content)
    }

    pub fn replace(
        &self,
        principal: Principal,
        id: PropertyId,
        content: PropertyContent,
    ) -> Result<Property, PropertyError> {
        let mut property = self.owned(principal, id)?;
        property.content = content;
        property.updated_at = Utc::now();
        self.repository.update(property.clone())?;
        Ok(property)
    }

    /// Applies one named section of edits in a single write.
    pub fn update_section(
        &self,
        principal: Principal,
        id: PropertyId,
        section: &str,
        fields: &Map<String, Value>,
    ) -> Result<Property, PropertyError> {
        let mut property = self.owned(principal, id)?;
        let content = &mut property.content;

        match section {
            "basic" => {
                content.title = text_field(fields, "title");
                content.description = text_field(fields, "description");
                content.room_type = text_field(fields, "room_type");
                content.person_capacity = match fields.get("person_capacity") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(raw)) if raw.trim().is_empty() => None,
                    Some(raw) => Some(parse_integer(raw).ok_or_else(|| {
                        FieldErrors::single("person_capacity", "A valid integer is required.")
                    })?),
                };
            }
            "location" => {
                let latitude = fields.get("latitude").and_then(parse_float);
                let longitude = fields.get("longitude").and_then(parse_float);
                let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
                    return Err(FieldErrors::single(
                        NON_FIELD_ERRORS,
                        "Please provide both latitude and longitude.",
                    )
                    .into());
                };
                content.coordinates = Some(Coordinates {
                    latitude,
                    longitude,
                });
            }
            "house-rules" => {
                let rules = content.house_rules.get_or_insert_with(HouseRules::default);
                rules.additional = text_field(fields, "additional");
            }
            "host" => {
                let host = content.host.get_or_insert_with(Host::default);
                host.name = text_field(fields, "name").unwrap_or_default();
                host.host_id = text_field(fields, "host_id").unwrap_or_default();
            }
            other => return Err(PropertyError::UnknownSection(other.to_string())),
        }

        property.updated_at = Utc::now();
        self.repository.update(property.clone())?;
        info!(property_id = %property.id, section, "property section updated");
        Ok(property)
    }

    pub fn delete(&self, principal: Principal, id: PropertyId) -> Result<(), PropertyError> {
        let property = self.owned(principal, id)?;
        self.repository.delete(property.id)?;
        info!(property_id = %id, "property deleted");
        Ok(())
    }

    fn insert(&self, owner: UserId, content: PropertyContent) -> Result<Property, PropertyError> {
        let now = Utc::now();
        let property = Property {
            id: next_property_id(),
            owner,
            content,
            created_at: now,
            updated_at: now,
        };
        Ok(self.repository.insert(property)?)
    }

    fn owned(&self, principal: Principal, id: PropertyId) -> Result<Property, PropertyError> {
        let caller = principal.user_id().ok_or(PropertyError::Unauthenticated)?;
        let property = self.retrieve(id)?;
        if property.owner != caller {
            return Err(PropertyError::Forbidden);
        }
        Ok(property)
    }

    fn paginate(
        &self,
        properties: Vec<Property>,
        page: usize,
    ) -> Result<Page<PropertySummary>, PropertyError> {
        let count = properties.len();
        let total_pages = count.div_ceil(PAGE_SIZE).max(1);
        let page = page.max(1);
        if page > total_pages {
            return Err(PropertyError::InvalidPage);
        }

        let results = properties
            .into_iter()
            .skip((page - 1) * PAGE_SIZE)
            .take(PAGE_SIZE)
            .map(|property| {
                let email = self
                    .users
                    .fetch(property.owner)?
                    .map(|user| user.email);
                Ok(property.summary(email))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Page {
            count,
            page,
            total_pages,
            results,
        })
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("property not found")]
    NotFound,
    #[error("authentication required")]
    Unauthenticated,
    #[error("only the owner may change this property")]
    Forbidden,
    #[error("Unknown section: {0}")]
    UnknownSection(String),
    #[error("Invalid page.")]
    InvalidPage,
    #[error("{0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FieldErrors> for PropertyError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
