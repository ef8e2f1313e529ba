use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DeployError;
use crate::leads::LeadRegistration;
use crate::properties::domain::{
    Amenity, Coordinates, Highlight, Host, Image, LocationDescription, Rating,
};
use crate::properties::Property;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyData {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub room_type: Option<String>,
    pub person_capacity: Option<i64>,
    pub is_super_host: bool,
    pub is_guest_favorite: bool,
    pub language: Option<String>,
    pub images: Vec<Image>,
    pub rating: Option<Rating>,
    pub coordinates: Option<Coordinates>,
    pub host: Option<Host>,
    pub amenities: Vec<Amenity>,
    pub highlights: Vec<Highlight>,
    pub location_descriptions: Vec<LocationDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadData {
    pub domain_name: Option<String>,
    pub theme: Option<String>,
    pub color_scheme: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// JSON the static theme reads at build time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeDocument {
    pub property: PropertyData,
    pub lead: LeadData,
}

impl ThemeDocument {
    pub fn new(
        property: &Property,
        lead: &LeadRegistration,
        theme_name: Option<String>,
        color_scheme_name: Option<String>,
    ) -> Self {
        let content = &property.content;
        Self {
            property: PropertyData {
                id: property.id.to_string(),
                title: content.title.clone(),
                description: content.description.clone(),
                room_type: content.room_type.clone(),
                person_capacity: content.person_capacity,
                is_super_host: content.is_super_host,
                is_guest_favorite: content.is_guest_favorite,
                language: content.language.clone(),
                images: content.images.clone(),
                rating: content.rating.clone(),
                coordinates: content.coordinates.clone(),
                host: content.host.clone(),
                amenities: content.amenities.clone(),
                highlights: content.highlights.clone(),
                location_descriptions: content.location_descriptions.clone(),
            },
            lead: LeadData {
                domain_name: lead.domain_name.clone(),
                theme: theme_name,
                color_scheme: color_scheme_name,
                email: lead.email.clone(),
                phone: lead.phone_number.clone(),
            },
        }
    }

    pub fn path_for(theme_dir: &Path, lead: &LeadRegistration) -> PathBuf {
        theme_dir
            .join("src")
            .join("data")
            .join(format!("property-{}.json", lead.id))
    }

    /// Writes the pretty-printed document, creating `src/data` when needed.
    pub async fn write(&self, path: &Path) -> Result<(), DeployError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered =
            serde_json::to_vec_pretty(self).map_err(|err| DeployError::Export(err.to_string()))?;
        tokio::fs::write(path, rendered).await?;
        Ok(())
    }
}
